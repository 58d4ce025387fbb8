//! The `ObstacleSensor` capability.

use rover_types::RoverError;

/// Answers whether the path directly ahead of the robot is blocked.
///
/// Implementations typically combine a physical range reading with a
/// geometric check against a known map; see `rover-perception`.
pub trait ObstacleSensor: Send + Sync {
    /// # Errors
    ///
    /// Returns [`RoverError::Sensor`] when the underlying reading fails.
    /// Callers treat an error as "blocked".
    fn is_obstacle_ahead(&self) -> Result<bool, RoverError>;
}
