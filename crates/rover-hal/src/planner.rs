//! The `RoutePlanner` capability.

use rover_types::{Pose, Route, RoverError, Waypoint};

/// Produces a drivable route from the current pose to a waypoint.
///
/// The planner may detour around mapped obstacles; the supervisor only
/// hands the result to [`Drive::follow_route`][crate::Drive::follow_route].
pub trait RoutePlanner: Send + Sync {
    /// # Errors
    ///
    /// Returns [`RoverError::NoRoute`] when the waypoint cannot be reached.
    fn plan(&self, from: Pose, to: &Waypoint) -> Result<Route, RoverError>;
}
