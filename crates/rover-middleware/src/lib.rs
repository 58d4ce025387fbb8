//! `rover-middleware` – everything between the robot and the socket.
//!
//! - [`wire`] – the big-endian control-channel protocol: handshake, command
//!   codes, the route object and telemetry frame encoding.
//! - [`sink`] – [`TelemetrySink`]: the single, serialised writer shared by
//!   the position ticker and the video streamer.
//! - [`video`] – [`VideoStreamer`]: an independent camera-to-sink producer.

pub mod sink;
pub mod video;
pub mod wire;

pub use sink::TelemetrySink;
pub use video::{VideoStats, VideoStreamer};
pub use wire::{CommandReader, DEFAULT_PORT};
