//! Generic `Drive` trait for the differential-drive base.
//!
//! Motion calls *start* a motion and return once it is engaged.  Completion
//! is observed separately through [`Drive::wait_for_stop`], which resolves
//! when the motion has physically finished or has been pre-empted by
//! [`Drive::stop`].  Splitting the two lets the supervisor race completion
//! against its cancellation token at a single well-defined point.

use async_trait::async_trait;
use rover_types::{Pose, Route, RoverError};

/// Read-only access to the current pose estimate.
pub trait PoseSource: Send + Sync {
    /// The most recent pose estimate.  Must be cheap; it is polled at the
    /// obstacle watcher's rate.
    fn current_pose(&self) -> Pose;
}

/// A differential-drive base.
///
/// Kinematics, motor regulation and dead reckoning live behind this trait.
#[async_trait]
pub trait Drive: PoseSource {
    /// Start driving forward until [`stop`][Self::stop] is called.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::HardwareFault`] if the motors refuse the command.
    async fn forward(&self) -> Result<(), RoverError>;

    /// Start driving backward until [`stop`][Self::stop] is called.
    async fn backward(&self) -> Result<(), RoverError>;

    /// Start a bounded full rotation counter-clockwise in place.
    async fn turn_left(&self) -> Result<(), RoverError>;

    /// Start a bounded full rotation clockwise in place.
    async fn turn_right(&self) -> Result<(), RoverError>;

    /// Start following `route` point by point.
    async fn follow_route(&self, route: &Route) -> Result<(), RoverError>;

    /// Stop any motion in progress.  Idempotent.
    async fn stop(&self) -> Result<(), RoverError>;

    /// Resolve once the base is no longer moving, whether the motion finished
    /// on its own or was stopped.
    async fn wait_for_stop(&self) -> Result<(), RoverError>;
}
