//! Sub-tasks that run alongside a motion action.
//!
//! Both take two tokens: `stop` ends the sub-task (cancelled by the action's
//! teardown once the drive is at rest), `action` is the owning action's
//! token, cancelled by the sub-task when it needs the action to end.

use std::sync::Arc;
use std::time::Duration;

use rover_hal::{ObstacleSensor, PoseSource};
use rover_middleware::TelemetrySink;
use rover_types::{RoverError, TelemetryFrame};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::stats::SupervisorStats;

// ────────────────────────────────────────────────────────────────────────────
// Obstacle watcher
// ────────────────────────────────────────────────────────────────────────────

/// Poll `obstacles` every `poll` until a hazard is seen or `stop` fires.
///
/// On a hazard the owning action is cancelled once and the watcher exits.  A
/// sensor error counts as a hazard.
pub(crate) async fn obstacle_watch(
    obstacles: Arc<dyn ObstacleSensor>,
    stats: Arc<SupervisorStats>,
    poll: Duration,
    stop: CancellationToken,
    action: CancellationToken,
    action_id: Uuid,
) {
    let _alive = stats.watcher_guard();
    let mut interval = tokio::time::interval(poll);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = interval.tick() => {}
        }

        let hazard = match obstacles.is_obstacle_ahead() {
            Ok(blocked) => blocked,
            Err(e) => {
                warn!(action = %action_id, error = %e, "obstacle check failed; treating as blocked");
                true
            }
        };
        if hazard {
            info!(action = %action_id, "obstacle ahead; cancelling action");
            action.cancel();
            break;
        }
    }
    debug!(action = %action_id, "obstacle watcher stopped");
}

// ────────────────────────────────────────────────────────────────────────────
// Position ticker
// ────────────────────────────────────────────────────────────────────────────

/// Submit the current pose every `period` until `stop` fires, then once more
/// so the last frame is the pose the robot came to rest at.
///
/// A failed submission ends the ticker and cancels the owning action; the
/// error is returned to the action's teardown.
pub(crate) async fn position_ticker<P>(
    pose: Arc<P>,
    sink: Arc<TelemetrySink>,
    stats: Arc<SupervisorStats>,
    period: Duration,
    stop: CancellationToken,
    action: CancellationToken,
) -> Result<(), RoverError>
where
    P: PoseSource + ?Sized,
{
    let _alive = stats.watcher_guard();
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = interval.tick() => {}
        }

        let frame = TelemetryFrame::Position(pose.current_pose());
        if let Err(e) = sink.submit(&frame).await {
            error!(error = %e, "position stream broken; cancelling action");
            action.cancel();
            return Err(e);
        }
        stats.pose_tick();
    }

    sink.submit(&TelemetryFrame::Position(pose.current_pose())).await?;
    stats.pose_tick();
    Ok(())
}
