//! Generic `DistanceSensor` trait for forward-facing range finders (infrared,
//! ultrasonic, …).

use rover_types::RoverError;

/// A range finder pointing along the robot's heading.
pub trait DistanceSensor: Send + Sync {
    /// Stable identifier for this sensor, e.g. `"front_ir"`.
    fn id(&self) -> &str;

    /// Fetch one sample: distance to the nearest physical object.
    ///
    /// Returns `f32::INFINITY` when nothing is in range.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Sensor`] if the sample cannot be read.
    fn distance(&self) -> Result<f32, RoverError>;

    /// `true` when the measured distance is at or below `limit`.
    fn distance_limit_reached(&self, limit: f32) -> Result<bool, RoverError> {
        Ok(self.distance()? <= limit)
    }
}
