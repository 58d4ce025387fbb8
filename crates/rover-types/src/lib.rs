//! `rover-types` – shared data model for the rover teleop stack.
//!
//! Every other crate in the workspace speaks in these types: the command the
//! client sent, the pose the drive reports, the waypoints of a navigation
//! request and the telemetry frames streamed back over the wire.

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Integer codes used on the control channel, one per [`Command`].
pub mod command_code {
    pub const END_PROGRAM: i32 = -2;
    pub const STOP: i32 = -1;
    pub const MOVE_FORWARD: i32 = 2;
    pub const MOVE_BACKWARD: i32 = 3;
    pub const TURN_LEFT: i32 = 4;
    pub const TURN_RIGHT: i32 = 5;
    pub const NAVIGATE: i32 = 6;
}

/// A point in the map plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(self, other: Point2) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Robot pose estimate: map position plus heading in degrees.
///
/// Produced by the drive; the supervisor only ever reads it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    /// Heading in degrees, counter-clockwise from the +x axis.
    pub heading: f32,
}

impl Pose {
    pub fn new(x: f32, y: f32, heading: f32) -> Self {
        Self { x, y, heading }
    }

    pub fn location(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }

    /// Heading folded into `[0, 360)`.
    pub fn normalized_heading(&self) -> f32 {
        let h = self.heading.rem_euclid(360.0);
        // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
        if h >= 360.0 { 0.0 } else { h }
    }

    /// The point `distance` units ahead along the current heading.
    pub fn project(&self, distance: f32) -> Point2 {
        let rad = self.heading.to_radians();
        Point2::new(self.x + rad.cos() * distance, self.y + rad.sin() * distance)
    }
}

/// One target of a navigation request.
///
/// Only `x`/`y` steer the planner; the remaining fields are part of the
/// client's object format and are carried through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Waypoint {
    pub x: f32,
    pub y: f32,
    pub heading_required: bool,
    pub heading: f32,
    pub max_position_error: f32,
    pub max_heading_error: f32,
}

impl Waypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    pub fn point(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}

/// An ordered sequence of waypoints.  Order is traversal order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Route {
    waypoints: Vec<Waypoint>,
}

impl Route {
    pub fn new(waypoints: Vec<Waypoint>) -> Self {
        Self { waypoints }
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Waypoint> {
        self.waypoints.iter()
    }
}

impl FromIterator<Waypoint> for Route {
    fn from_iter<I: IntoIterator<Item = Waypoint>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Route {
    type Item = &'a Waypoint;
    type IntoIter = std::slice::Iter<'a, Waypoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.waypoints.iter()
    }
}

/// A command decoded from the control channel.  Immutable once read.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    MoveForward,
    MoveBackward,
    TurnLeft,
    TurnRight,
    Navigate(Route),
    /// Cancel the active action and stay idle.
    Stop,
    /// End the session and tear everything down.
    Shutdown,
}

impl Command {
    /// The control-channel code for this command.
    pub fn code(&self) -> i32 {
        match self {
            Command::MoveForward => command_code::MOVE_FORWARD,
            Command::MoveBackward => command_code::MOVE_BACKWARD,
            Command::TurnLeft => command_code::TURN_LEFT,
            Command::TurnRight => command_code::TURN_RIGHT,
            Command::Navigate(_) => command_code::NAVIGATE,
            Command::Stop => command_code::STOP,
            Command::Shutdown => command_code::END_PROGRAM,
        }
    }

    /// Short label used in log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Command::MoveForward => "move_forward",
            Command::MoveBackward => "move_backward",
            Command::TurnLeft => "turn_left",
            Command::TurnRight => "turn_right",
            Command::Navigate(_) => "navigate",
            Command::Stop => "stop",
            Command::Shutdown => "shutdown",
        }
    }
}

/// Wheel geometry sent by the client during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobotConfig {
    pub wheel_diameter: f64,
    pub wheel_offset: f64,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            wheel_diameter: 4.15,
            wheel_offset: 6.49,
        }
    }
}

/// One unit of outbound telemetry.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryFrame {
    Position(Pose),
    /// A JPEG-encoded camera frame.
    VideoFrame(Bytes),
}

impl TelemetryFrame {
    pub const TAG_POSITION: i32 = 1;
    pub const TAG_VIDEO_FRAME: i32 = 2;

    pub fn tag(&self) -> i32 {
        match self {
            TelemetryFrame::Position(_) => Self::TAG_POSITION,
            TelemetryFrame::VideoFrame(_) => Self::TAG_VIDEO_FRAME,
        }
    }
}

/// Global error type spanning transport, protocol and capability failures.
#[derive(Error, Debug)]
pub enum RoverError {
    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Sensor Error on {sensor}: {details}")]
    Sensor { sensor: String, details: String },

    #[error("No route from ({:.1}, {:.1}) to ({:.1}, {:.1})", .from.x, .from.y, .to.x, .to.y)]
    NoRoute { from: Point2, to: Point2 },

    #[error("Protocol Error: {0}")]
    Protocol(String),

    #[error("Telemetry sink is closed")]
    SinkClosed,

    #[error("Action {action} did not stop within {timeout:?}")]
    JoinTimeout { action: String, timeout: Duration },

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
}

impl RoverError {
    /// `true` for failures of the connection itself rather than of the robot.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RoverError::Io(_) | RoverError::SinkClosed | RoverError::Protocol(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_heading_folds_into_range() {
        assert!((Pose::new(0.0, 0.0, 370.0).normalized_heading() - 10.0).abs() < 1e-4);
        assert!((Pose::new(0.0, 0.0, -90.0).normalized_heading() - 270.0).abs() < 1e-4);
        assert_eq!(Pose::new(0.0, 0.0, 0.0).normalized_heading(), 0.0);
    }

    #[test]
    fn project_follows_heading() {
        let ahead = Pose::new(20.0, 20.0, 90.0).project(17.0);
        assert!((ahead.x - 20.0).abs() < 1e-4);
        assert!((ahead.y - 37.0).abs() < 1e-4);

        let east = Pose::new(0.0, 0.0, 0.0).project(10.0);
        assert!((east.x - 10.0).abs() < 1e-4);
        assert!(east.y.abs() < 1e-4);
    }

    #[test]
    fn command_codes_match_wire_protocol() {
        assert_eq!(Command::Shutdown.code(), -2);
        assert_eq!(Command::Stop.code(), -1);
        assert_eq!(Command::MoveForward.code(), 2);
        assert_eq!(Command::Navigate(Route::default()).code(), 6);
    }

    #[test]
    fn route_preserves_insertion_order() {
        let route: Route = [Waypoint::new(1.0, 2.0), Waypoint::new(3.0, 4.0)]
            .into_iter()
            .collect();
        let xs: Vec<f32> = route.iter().map(|w| w.x).collect();
        assert_eq!(xs, vec![1.0, 3.0]);
    }

    #[test]
    fn pose_serialization_roundtrip() {
        let pose = Pose::new(20.0, 20.0, 45.0);
        let json = serde_json::to_string(&pose).unwrap();
        let back: Pose = serde_json::from_str(&json).unwrap();
        assert_eq!(pose, back);
    }

    #[test]
    fn rover_error_display() {
        let err = RoverError::HardwareFault {
            component: "left_motor".to_string(),
            details: "stalled".to_string(),
        };
        assert!(err.to_string().contains("left_motor"));
        assert!(!err.is_transport());

        let no_route = RoverError::NoRoute {
            from: Point2::new(0.0, 0.0),
            to: Point2::new(10.0, 5.0),
        };
        assert!(no_route.to_string().contains("(10.0, 5.0)"));
        assert!(RoverError::SinkClosed.is_transport());
    }
}
