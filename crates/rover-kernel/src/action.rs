//! Actions: one command's physical effect plus the watchers that run
//! alongside it.
//!
//! ```text
//! Created ──► Running ──► Completed
//!                    ├──► Cancelled   (new command, Stop, hazard)
//!                    └──► Failed      (capability error)
//! ```
//!
//! An action body owns its watchers.  Whatever way the body ends, it cancels
//! and joins them before it returns, so a finished action never leaves a
//! ticker or watcher behind.  The watchers stop on their own token, not the
//! action's: a cancelled action still reports its pose while it halts.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rover_hal::ObstacleSensor;
use rover_middleware::TelemetrySink;
use rover_types::{Command, RoverError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::stats::SupervisorStats;
use crate::supervisor::{Capabilities, SupervisorConfig};
use crate::watchers::{obstacle_watch, position_ticker};

/// Lifecycle of one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionState {
    Created,
    Running,
    Completed,
    Cancelled,
    Failed(String),
}

impl ActionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionState::Completed | ActionState::Cancelled | ActionState::Failed(_)
        )
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionState::Created => f.write_str("created"),
            ActionState::Running => f.write_str("running"),
            ActionState::Completed => f.write_str("completed"),
            ActionState::Cancelled => f.write_str("cancelled"),
            ActionState::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Everything an action body needs, cloned out of the supervisor.
#[derive(Clone)]
pub(crate) struct ActionContext {
    pub id: Uuid,
    pub caps: Capabilities,
    pub sink: Arc<TelemetrySink>,
    pub stats: Arc<SupervisorStats>,
    pub config: SupervisorConfig,
    /// Cancelling this ends the action.
    pub token: CancellationToken,
    /// Cancelling this ends the action's watchers.
    pub watch_token: CancellationToken,
    /// Held by every watcher task; the supervisor waits for all clones to
    /// drop when it has to abort the action.
    pub released: mpsc::Sender<()>,
}

impl ActionContext {
    /// Spawn the position ticker and, given a sensor, the obstacle watcher.
    pub fn start_watchers(&self, obstacles: Option<Arc<dyn ObstacleSensor>>) -> Watchers {
        let token = self.watch_token.clone();

        let ticker = position_ticker(
            Arc::clone(&self.caps.drive),
            Arc::clone(&self.sink),
            Arc::clone(&self.stats),
            self.config.tick_interval,
            token.clone(),
            self.token.clone(),
        );
        let released = self.released.clone();
        let ticker = tokio::spawn(async move {
            let _released = released;
            ticker.await
        });

        let watcher = obstacles.map(|obstacles| {
            let watch = obstacle_watch(
                obstacles,
                Arc::clone(&self.stats),
                self.config.watch_poll,
                token.clone(),
                self.token.clone(),
                self.id,
            );
            let released = self.released.clone();
            tokio::spawn(async move {
                let _released = released;
                watch.await
            })
        });

        Watchers {
            token,
            ticker,
            watcher,
        }
    }

    /// Stop the drive and wait until it reports stopped.
    pub async fn halt(&self) -> Result<(), RoverError> {
        self.caps.drive.stop().await?;
        self.caps.drive.wait_for_stop().await
    }

    /// Wait for the current motion to finish, or halt it on cancellation.
    ///
    /// Returns `true` when the motion ran to completion.
    pub async fn await_motion(&self) -> Result<bool, RoverError> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                self.halt().await?;
                Ok(false)
            }
            stopped = self.caps.drive.wait_for_stop() => {
                stopped?;
                // A hazard may have fired while the drive was stopping.
                Ok(!self.token.is_cancelled())
            }
        }
    }
}

/// The sub-tasks of one action.  Must be released with [`Watchers::join`].
pub(crate) struct Watchers {
    token: CancellationToken,
    ticker: JoinHandle<Result<(), RoverError>>,
    watcher: Option<JoinHandle<()>>,
}

impl Watchers {
    /// Cancel every sub-task and wait for it to exit.
    ///
    /// Returns the ticker's error if the position stream broke.
    pub async fn join(self) -> Result<(), RoverError> {
        self.token.cancel();
        if let Some(watcher) = self.watcher
            && let Err(e) = watcher.await
        {
            warn!(error = %e, "obstacle watcher task did not exit cleanly");
        }
        match self.ticker.await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "position ticker task did not exit cleanly");
                Ok(())
            }
        }
    }
}

/// Run an action for `command` to a terminal state.
///
/// The caller has already counted the action as started.
pub(crate) async fn run(ctx: ActionContext, command: Command) -> ActionState {
    let _running = ctx.stats.running_guard();
    debug!(action = %ctx.id, command = command.label(), "action running");

    let outcome = match &command {
        Command::Navigate(route) => crate::navigate::run(&ctx, route).await,
        _ => run_motion(&ctx, &command).await,
    };

    let state = match outcome {
        Ok(true) => ActionState::Completed,
        Ok(false) => ActionState::Cancelled,
        Err(e) => {
            error!(action = %ctx.id, command = command.label(), error = %e, "action failed");
            if let Err(stop_err) = ctx.caps.drive.stop().await {
                error!(action = %ctx.id, error = %stop_err, "drive stop after failure also failed");
            }
            ActionState::Failed(e.to_string())
        }
    };

    info!(action = %ctx.id, command = command.label(), state = %state, "action finished");
    ctx.stats.action_finished(&state);
    state
}

/// Forward, backward and the two turns.
async fn run_motion(ctx: &ActionContext, command: &Command) -> Result<bool, RoverError> {
    let obstacles =
        matches!(command, Command::MoveForward).then(|| Arc::clone(&ctx.caps.obstacles));
    let watchers = ctx.start_watchers(obstacles);

    let motion = async {
        let drive = &ctx.caps.drive;
        match command {
            Command::MoveForward => drive.forward().await?,
            Command::MoveBackward => drive.backward().await?,
            Command::TurnLeft => drive.turn_left().await?,
            Command::TurnRight => drive.turn_right().await?,
            other => {
                return Err(RoverError::Protocol(format!(
                    "{} is not a simple motion",
                    other.label()
                )));
            }
        }
        ctx.await_motion().await
    };
    let result = motion.await;

    let joined = watchers.join().await;
    finish(result, joined)
}

/// Combine the body's result with the watchers' result.  A broken position
/// stream turns an otherwise clean finish into a failure.
pub(crate) fn finish(
    result: Result<bool, RoverError>,
    watchers: Result<(), RoverError>,
) -> Result<bool, RoverError> {
    let completed = result?;
    watchers?;
    Ok(completed)
}

/// Wait up to `timeout` for an action task.
pub(crate) async fn join_bounded(
    task: &mut JoinHandle<ActionState>,
    timeout: Duration,
) -> Option<ActionState> {
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(state)) => Some(state),
        Ok(Err(e)) => {
            error!(error = %e, "action task panicked");
            Some(ActionState::Failed(e.to_string()))
        }
        Err(_) => None,
    }
}
