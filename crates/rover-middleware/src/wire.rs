//! Control-channel wire protocol.
//!
//! All multi-byte values are big-endian.
//!
//! | Direction | Layout |
//! |---|---|
//! | client → robot, once | `f64 wheel_diameter`, `f64 wheel_offset` |
//! | client → robot | `i32 code`; code `6` is followed by a route object |
//! | robot → client | `i32 tag`; `1` ⇒ `f32 x, f32 y, f32 heading`; `2` ⇒ `i32 len` + JPEG bytes |
//!
//! A route object is `i32 count` followed by `count` waypoints of
//! `f32 x, f32 y, u8 heading_required, f32 heading, f32 max_position_error,
//! f32 max_heading_error`.

use bytes::{BufMut, Bytes, BytesMut};
use rover_types::{Command, Pose, RobotConfig, Route, RoverError, TelemetryFrame, Waypoint, command_code};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

/// Port the server listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 1111;

/// Upper bound on waypoints accepted in one route object.
pub const MAX_ROUTE_LEN: usize = 4096;

/// Upper bound on a single video frame payload.
pub const MAX_FRAME_LEN: usize = 8 * 1024 * 1024;

const WAYPOINT_LEN: usize = 4 * 5 + 1;

// ────────────────────────────────────────────────────────────────────────────
// Reading commands
// ────────────────────────────────────────────────────────────────────────────

/// Decodes the client's byte stream into [`Command`]s.
pub struct CommandReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> CommandReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read the two-`f64` handshake.
    ///
    /// A failed or nonsensical handshake is logged and the default geometry
    /// is used instead; the session carries on.
    pub async fn read_handshake(&mut self) -> RobotConfig {
        match self.try_read_handshake().await {
            Ok(config) => {
                info!(
                    wheel_diameter = config.wheel_diameter,
                    wheel_offset = config.wheel_offset,
                    "handshake received"
                );
                config
            }
            Err(e) => {
                warn!(error = %e, "handshake failed; using default robot geometry");
                RobotConfig::default()
            }
        }
    }

    async fn try_read_handshake(&mut self) -> Result<RobotConfig, RoverError> {
        let wheel_diameter = self.inner.read_f64().await?;
        let wheel_offset = self.inner.read_f64().await?;
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(wheel_diameter) || !valid(wheel_offset) {
            return Err(RoverError::Protocol(format!(
                "invalid geometry: diameter {wheel_diameter}, offset {wheel_offset}"
            )));
        }
        Ok(RobotConfig {
            wheel_diameter,
            wheel_offset,
        })
    }

    /// Read the next known command, skipping unknown codes.
    ///
    /// # Errors
    ///
    /// End of stream and read failures surface as [`RoverError::Io`]; a
    /// malformed route object as [`RoverError::Protocol`].
    pub async fn next_command(&mut self) -> Result<Command, RoverError> {
        loop {
            let code = self.inner.read_i32().await?;
            let command = match code {
                command_code::END_PROGRAM => Command::Shutdown,
                command_code::STOP => Command::Stop,
                command_code::MOVE_FORWARD => Command::MoveForward,
                command_code::MOVE_BACKWARD => Command::MoveBackward,
                command_code::TURN_LEFT => Command::TurnLeft,
                command_code::TURN_RIGHT => Command::TurnRight,
                command_code::NAVIGATE => Command::Navigate(read_route(&mut self.inner).await?),
                other => {
                    warn!(code = other, "ignoring unknown command code");
                    continue;
                }
            };
            debug!(command = command.label(), "command received");
            return Ok(command);
        }
    }
}

/// Decode one route object.
pub async fn read_route<R: AsyncRead + Unpin>(r: &mut R) -> Result<Route, RoverError> {
    let count = r.read_i32().await?;
    let count = usize::try_from(count)
        .map_err(|_| RoverError::Protocol(format!("negative waypoint count {count}")))?;
    if count > MAX_ROUTE_LEN {
        return Err(RoverError::Protocol(format!(
            "route of {count} waypoints exceeds limit of {MAX_ROUTE_LEN}"
        )));
    }

    let mut waypoints = Vec::with_capacity(count);
    for _ in 0..count {
        waypoints.push(Waypoint {
            x: r.read_f32().await?,
            y: r.read_f32().await?,
            heading_required: r.read_u8().await? != 0,
            heading: r.read_f32().await?,
            max_position_error: r.read_f32().await?,
            max_heading_error: r.read_f32().await?,
        });
    }
    Ok(Route::new(waypoints))
}

// ────────────────────────────────────────────────────────────────────────────
// Encoding (robot → client, and client-side helpers)
// ────────────────────────────────────────────────────────────────────────────

/// Append a route object to `buf`.
pub fn encode_route(route: &Route, buf: &mut BytesMut) {
    buf.reserve(4 + route.len() * WAYPOINT_LEN);
    // Routes are bounded by MAX_ROUTE_LEN on the way in.
    buf.put_i32(route.len() as i32);
    for w in route {
        buf.put_f32(w.x);
        buf.put_f32(w.y);
        buf.put_u8(u8::from(w.heading_required));
        buf.put_f32(w.heading);
        buf.put_f32(w.max_position_error);
        buf.put_f32(w.max_heading_error);
    }
}

/// Append a command, as a client would send it, to `buf`.
pub fn encode_command(command: &Command, buf: &mut BytesMut) {
    buf.put_i32(command.code());
    if let Command::Navigate(route) = command {
        encode_route(route, buf);
    }
}

/// Append the handshake, as a client would send it, to `buf`.
pub fn encode_handshake(config: &RobotConfig, buf: &mut BytesMut) {
    buf.put_f64(config.wheel_diameter);
    buf.put_f64(config.wheel_offset);
}

/// Encode one complete telemetry frame.
pub fn encode_frame(frame: &TelemetryFrame) -> Bytes {
    match frame {
        TelemetryFrame::Position(pose) => {
            let mut buf = BytesMut::with_capacity(16);
            buf.put_i32(frame.tag());
            buf.put_f32(pose.x);
            buf.put_f32(pose.y);
            buf.put_f32(pose.heading);
            buf.freeze()
        }
        TelemetryFrame::VideoFrame(jpeg) => {
            let mut buf = BytesMut::with_capacity(8 + jpeg.len());
            buf.put_i32(frame.tag());
            buf.put_i32(jpeg.len() as i32);
            buf.put_slice(jpeg);
            buf.freeze()
        }
    }
}

/// Decode one telemetry frame, as a client would.
pub async fn read_frame<R: AsyncRead + Unpin>(r: &mut R) -> Result<TelemetryFrame, RoverError> {
    match r.read_i32().await? {
        TelemetryFrame::TAG_POSITION => {
            let x = r.read_f32().await?;
            let y = r.read_f32().await?;
            let heading = r.read_f32().await?;
            Ok(TelemetryFrame::Position(Pose::new(x, y, heading)))
        }
        TelemetryFrame::TAG_VIDEO_FRAME => {
            let len = r.read_i32().await?;
            let len = usize::try_from(len)
                .ok()
                .filter(|&l| l <= MAX_FRAME_LEN)
                .ok_or_else(|| RoverError::Protocol(format!("bad video frame length {len}")))?;
            let mut jpeg = vec![0u8; len];
            r.read_exact(&mut jpeg).await?;
            Ok(TelemetryFrame::VideoFrame(Bytes::from(jpeg)))
        }
        tag => Err(RoverError::Protocol(format!("unknown telemetry tag {tag}"))),
    }
}
