//! Combined range-plus-map obstacle detection.

use std::sync::Arc;

use rover_hal::{DistanceSensor, ObstacleSensor, PoseSource};
use rover_types::RoverError;
use tracing::trace;

use crate::line_map::{ObstacleMap, Segment};

/// Range reading at or below which the way ahead counts as blocked.
pub const DEFAULT_DISTANCE_THRESHOLD: f32 = 100.0;

/// Length of the heading probe tested against the map.
pub const DEFAULT_PROBE_LENGTH: f32 = 17.0;

/// An [`ObstacleSensor`] that reports "blocked" when either the range finder
/// sees something close, or a short probe along the current heading touches a
/// mapped wall.
///
/// [`range_only`](Self::range_only) drops the map probe.  That variant guards
/// planned routes, where walls are already the planner's concern and the
/// probe would fire on every waypoint close to one.
#[derive(Clone)]
pub struct ObstacleDetector {
    range: Arc<dyn DistanceSensor>,
    pose: Arc<dyn PoseSource>,
    map: Arc<ObstacleMap>,
    distance_threshold: f32,
    probe_length: f32,
    map_probe: bool,
}

impl ObstacleDetector {
    pub fn new(
        range: Arc<dyn DistanceSensor>,
        pose: Arc<dyn PoseSource>,
        map: Arc<ObstacleMap>,
    ) -> Self {
        Self {
            range,
            pose,
            map,
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            probe_length: DEFAULT_PROBE_LENGTH,
            map_probe: true,
        }
    }

    pub fn with_distance_threshold(mut self, threshold: f32) -> Self {
        self.distance_threshold = threshold;
        self
    }

    pub fn with_probe_length(mut self, length: f32) -> Self {
        self.probe_length = length;
        self
    }

    /// Only the range finder counts.
    pub fn range_only(mut self) -> Self {
        self.map_probe = false;
        self
    }

    /// The probe segment from the current pose along its heading.
    pub fn heading_probe(&self) -> Segment {
        let pose = self.pose.current_pose();
        Segment::new(pose.location(), pose.project(self.probe_length))
    }

    fn blocked_by_map(&self) -> bool {
        self.map.intersects(&self.heading_probe())
    }
}

impl ObstacleSensor for ObstacleDetector {
    fn is_obstacle_ahead(&self) -> Result<bool, RoverError> {
        if self.range.distance_limit_reached(self.distance_threshold)? {
            trace!(sensor = self.range.id(), "range finder reports obstacle");
            return Ok(true);
        }
        Ok(self.map_probe && self.blocked_by_map())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_hal::SimDistanceSensor;
    use rover_types::Pose;

    struct FixedPose(Pose);

    impl PoseSource for FixedPose {
        fn current_pose(&self) -> Pose {
            self.0
        }
    }

    fn detector(range: &SimDistanceSensor, pose: Pose) -> ObstacleDetector {
        ObstacleDetector::new(
            Arc::new(range.clone()),
            Arc::new(FixedPose(pose)),
            Arc::new(ObstacleMap::reference_arena()),
        )
    }

    #[test]
    fn open_floor_far_reading_is_clear() {
        let range = SimDistanceSensor::new("front_ir");
        let d = detector(&range, Pose::new(20.0, 20.0, 0.0));
        assert!(!d.is_obstacle_ahead().unwrap());
    }

    #[test]
    fn near_range_reading_blocks() {
        let range = SimDistanceSensor::new("front_ir");
        range.set_distance(100.0);
        let d = detector(&range, Pose::new(20.0, 20.0, 0.0));
        assert!(d.is_obstacle_ahead().unwrap());

        range.set_distance(100.5);
        assert!(!d.is_obstacle_ahead().unwrap());
    }

    #[test]
    fn wall_within_probe_blocks() {
        let range = SimDistanceSensor::new("front_ir");
        // 10 units short of the first block's left wall, facing it.
        let d = detector(&range, Pose::new(40.0, 60.0, 0.0));
        assert!(d.is_obstacle_ahead().unwrap());

        // Facing away from it.
        let d = detector(&range, Pose::new(40.0, 60.0, 180.0));
        assert!(!d.is_obstacle_ahead().unwrap());
    }

    #[test]
    fn probe_length_is_configurable() {
        let range = SimDistanceSensor::new("front_ir");
        let d = detector(&range, Pose::new(20.0, 60.0, 0.0));
        assert!(!d.is_obstacle_ahead().unwrap());
        let d = detector(&range, Pose::new(20.0, 60.0, 0.0)).with_probe_length(40.0);
        assert!(d.is_obstacle_ahead().unwrap());
    }

    #[test]
    fn range_only_ignores_walls_but_not_the_range_finder() {
        let range = SimDistanceSensor::new("front_ir");
        // Pointing straight at the corner it is about to reach.
        let d = detector(&range, Pose::new(11.0, 11.0, 225.0));
        assert!(d.is_obstacle_ahead().unwrap());

        let d = d.range_only();
        assert!(!d.is_obstacle_ahead().unwrap());
        range.set_distance(40.0);
        assert!(d.is_obstacle_ahead().unwrap());
    }

    #[test]
    fn sensor_failure_propagates() {
        let range = SimDistanceSensor::new("front_ir");
        range.set_failing(true);
        let d = detector(&range, Pose::new(20.0, 20.0, 0.0));
        assert!(matches!(d.is_obstacle_ahead(), Err(RoverError::Sensor { .. })));
    }
}
