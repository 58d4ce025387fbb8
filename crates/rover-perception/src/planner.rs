//! Map-aware single-hop route planning.

use std::sync::Arc;

use rover_hal::RoutePlanner;
use rover_types::{Pose, Route, RoverError, Waypoint};
use tracing::debug;

use crate::line_map::{ObstacleMap, Segment};

/// Clearance added to both ends of every wall before checking a path.
pub const DEFAULT_CLEARANCE: f32 = 20.0;

/// Plans a straight line to the target when that line stays inside the arena
/// and clear of every (lengthened) wall.
///
/// There is no detour search: a blocked straight line is reported as
/// [`RoverError::NoRoute`].
pub struct DirectRoutePlanner {
    map: Arc<ObstacleMap>,
}

impl DirectRoutePlanner {
    pub fn new(map: &ObstacleMap) -> Self {
        Self::with_clearance(map, DEFAULT_CLEARANCE)
    }

    pub fn with_clearance(map: &ObstacleMap, clearance: f32) -> Self {
        Self {
            map: Arc::new(map.lengthened(clearance)),
        }
    }
}

impl RoutePlanner for DirectRoutePlanner {
    fn plan(&self, from: Pose, to: &Waypoint) -> Result<Route, RoverError> {
        let start = from.location();
        let target = to.point();
        let no_route = || RoverError::NoRoute { from: start, to: target };

        if !self.map.bounds().contains(target) {
            debug!(x = target.x, y = target.y, "target outside arena");
            return Err(no_route());
        }
        if self.map.intersects(&Segment::new(start, target)) {
            debug!(x = target.x, y = target.y, "direct path crosses a wall");
            return Err(no_route());
        }
        Ok(Route::new(vec![*to]))
    }
}
