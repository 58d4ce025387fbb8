//! `rover-hal` – Hardware Abstraction Layer
//!
//! The supervisor never talks to motors, sensors or the camera directly.  It
//! consumes the capability traits defined here, and concrete drivers (or the
//! simulated stand-ins in [`sim`]) implement them.
//!
//! # Modules
//!
//! - [`drive`] – [`Drive`][drive::Drive] motion starts, `stop`, and
//!   `wait_for_stop`, plus the [`PoseSource`][drive::PoseSource] read side.
//! - [`distance`] – [`DistanceSensor`][distance::DistanceSensor] for the
//!   forward-facing range finder.
//! - [`obstacle`] – [`ObstacleSensor`][obstacle::ObstacleSensor], the single
//!   "is anything ahead?" question the obstacle watcher asks.
//! - [`planner`] – [`RoutePlanner`][planner::RoutePlanner] turning a pose and
//!   a waypoint into a route.
//! - [`camera`] – [`Camera`][camera::Camera] yielding JPEG-encoded frames.
//! - [`sim`] – in-process simulated drivers for headless runs and tests.

pub mod camera;
pub mod distance;
pub mod drive;
pub mod obstacle;
pub mod planner;
pub mod sim;

pub use camera::{Camera, CameraFrame};
pub use distance::DistanceSensor;
pub use drive::{Drive, PoseSource};
pub use obstacle::ObstacleSensor;
pub use planner::RoutePlanner;
pub use sim::{SimCamera, SimDistanceSensor, SimDrive, SimDriveConfig};
