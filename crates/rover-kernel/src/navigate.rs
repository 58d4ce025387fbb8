//! The navigate flow: plan and drive to each waypoint in turn.
//!
//! One position ticker covers the whole traversal.  The planner is asked
//! again at every waypoint, starting from wherever the robot actually ended
//! up after the previous leg.  The obstacle watcher, if enabled, polls the
//! route sensor: walls are left to the planner.

use std::sync::Arc;

use rover_types::{Route, RoverError};
use tracing::{debug, info};

use crate::action::{ActionContext, finish};

/// Returns `Ok(true)` once every waypoint was reached, `Ok(false)` if the
/// action was cancelled on the way.
pub(crate) async fn run(ctx: &ActionContext, route: &Route) -> Result<bool, RoverError> {
    let obstacles = ctx
        .config
        .navigate_obstacle_watch
        .then(|| Arc::clone(&ctx.caps.route_obstacles));
    let watchers = ctx.start_watchers(obstacles);
    let result = traverse(ctx, route).await;
    let joined = watchers.join().await;
    finish(result, joined)
}

async fn traverse(ctx: &ActionContext, route: &Route) -> Result<bool, RoverError> {
    info!(action = %ctx.id, waypoints = route.len(), "navigating");

    for (index, waypoint) in route.iter().enumerate() {
        if ctx.token.is_cancelled() {
            debug!(action = %ctx.id, remaining = route.len() - index, "navigation abandoned");
            return Ok(false);
        }

        let from = ctx.caps.drive.current_pose();
        let leg = ctx.caps.planner.plan(from, waypoint)?;
        debug!(
            action = %ctx.id,
            index,
            from_x = from.x,
            from_y = from.y,
            to_x = waypoint.x,
            to_y = waypoint.y,
            hops = leg.len(),
            "leg planned"
        );

        ctx.caps.drive.follow_route(&leg).await?;
        if !ctx.await_motion().await? {
            debug!(action = %ctx.id, remaining = route.len() - index - 1, "navigation cancelled");
            return Ok(false);
        }
    }
    Ok(true)
}
