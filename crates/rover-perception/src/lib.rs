//! `rover-perception` – the robot's picture of its surroundings.
//!
//! # Modules
//!
//! - [`line_map`] – [`ObstacleMap`][line_map::ObstacleMap]: an immutable set
//!   of wall segments loaded once at startup and shared read-only, plus the
//!   segment intersection test every geometric check relies on.
//! - [`detector`] – [`ObstacleDetector`][detector::ObstacleDetector]: the
//!   [`ObstacleSensor`][rover_hal::ObstacleSensor] combining a range reading
//!   with a short heading probe against the map.
//! - [`planner`] – [`DirectRoutePlanner`][planner::DirectRoutePlanner]: a
//!   map-aware one-hop [`RoutePlanner`][rover_hal::RoutePlanner].

pub mod detector;
pub mod line_map;
pub mod planner;

pub use detector::ObstacleDetector;
pub use line_map::{ObstacleMap, Rect, Segment};
pub use planner::DirectRoutePlanner;
