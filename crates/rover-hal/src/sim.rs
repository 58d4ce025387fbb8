//! In-process simulated drivers for headless runs and CI testing.
//!
//! [`SimDrive`] integrates a pose in a background Tokio task at a fixed step,
//! [`SimDistanceSensor`] returns a settable reading and [`SimCamera`] produces
//! small JPEG-framed payloads.  Together they let the whole server run without
//! any physical robot attached.
//!
//! # Example
//!
//! ```rust
//! use rover_hal::sim::{SimDrive, SimDriveConfig};
//! use rover_hal::{Drive, PoseSource};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let drive = SimDrive::start(SimDriveConfig::default());
//! drive.forward().await.unwrap();
//! drive.stop().await.unwrap();
//! drive.wait_for_stop().await.unwrap();
//! assert!(drive.current_pose().x >= 20.0);
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use parking_lot::Mutex;
use rover_types::{Point2, Pose, RobotConfig, Route, RoverError};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::camera::{Camera, CameraFrame};
use crate::distance::DistanceSensor;
use crate::drive::{Drive, PoseSource};

// ────────────────────────────────────────────────────────────────────────────
// Simulated drive
// ────────────────────────────────────────────────────────────────────────────

/// Tuning for [`SimDrive`].
#[derive(Debug, Clone)]
pub struct SimDriveConfig {
    /// Wheel geometry from the client handshake.
    pub geometry: RobotConfig,
    /// Wheel rotation speed in degrees per second.
    pub wheel_speed_deg_s: f32,
    /// Chassis rotation speed when turning in place, degrees per second.
    pub angular_speed_deg_s: f32,
    /// Pose the robot starts at.
    pub initial_pose: Pose,
    /// Integration step of the background task.
    pub step: Duration,
}

impl Default for SimDriveConfig {
    fn default() -> Self {
        Self {
            geometry: RobotConfig::default(),
            wheel_speed_deg_s: 360.0,
            angular_speed_deg_s: 100.0,
            initial_pose: Pose::new(20.0, 20.0, 0.0),
            step: Duration::from_millis(10),
        }
    }
}

impl SimDriveConfig {
    /// Linear speed in map units per second implied by wheel speed and
    /// diameter.
    pub fn linear_speed(&self) -> f32 {
        (self.wheel_speed_deg_s / 360.0) * std::f32::consts::PI * self.geometry.wheel_diameter as f32
    }
}

enum Motion {
    Idle,
    /// `direction` is `1.0` forward, `-1.0` backward.
    Linear { direction: f32 },
    /// Signed degrees still to rotate; positive is counter-clockwise.
    Rotate { remaining_deg: f32 },
    Route { targets: VecDeque<Point2> },
}

struct DriveState {
    pose: Pose,
    motion: Motion,
}

struct Shared {
    config: SimDriveConfig,
    state: Mutex<DriveState>,
    moving: watch::Sender<bool>,
    motion_starts: AtomicU64,
    stops: AtomicU64,
    fault: Mutex<Option<String>>,
}

impl Shared {
    fn begin(&self, motion: Motion) -> Result<(), RoverError> {
        if let Some(details) = self.fault.lock().take() {
            return Err(RoverError::HardwareFault {
                component: "sim_drive".to_string(),
                details,
            });
        }
        self.motion_starts.fetch_add(1, Ordering::SeqCst);

        let already_done = matches!(&motion, Motion::Route { targets } if targets.is_empty());
        let mut state = self.state.lock();
        state.motion = if already_done { Motion::Idle } else { motion };
        self.moving.send_replace(!already_done);
        Ok(())
    }

    fn halt(&self) {
        let mut state = self.state.lock();
        state.motion = Motion::Idle;
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.moving.send_replace(false);
    }

    fn advance(&self, dt: f32) {
        let linear = self.config.linear_speed();
        let angular = self.config.angular_speed_deg_s;

        let mut state = self.state.lock();
        let DriveState { pose, motion } = &mut *state;
        let finished = match &mut *motion {
            Motion::Idle => return,
            Motion::Linear { direction } => {
                let ahead = pose.project(*direction * linear * dt);
                pose.x = ahead.x;
                pose.y = ahead.y;
                false
            }
            Motion::Rotate { remaining_deg } => {
                let delta = (angular * dt).min(remaining_deg.abs()).copysign(*remaining_deg);
                pose.heading = (pose.heading + delta).rem_euclid(360.0);
                *remaining_deg -= delta;
                remaining_deg.abs() < 1e-4
            }
            Motion::Route { targets } => {
                let mut budget = linear * dt;
                while budget > 0.0 {
                    let Some(target) = targets.front().copied() else {
                        break;
                    };
                    let here = pose.location();
                    let dist = here.distance_to(target);
                    if dist > 1e-6 {
                        pose.heading = (target.y - here.y)
                            .atan2(target.x - here.x)
                            .to_degrees()
                            .rem_euclid(360.0);
                    }
                    if dist <= budget {
                        pose.x = target.x;
                        pose.y = target.y;
                        budget -= dist;
                        targets.pop_front();
                    } else {
                        let step = pose.project(budget);
                        pose.x = step.x;
                        pose.y = step.y;
                        budget = 0.0;
                    }
                }
                targets.is_empty()
            }
        };

        if finished {
            *motion = Motion::Idle;
            self.moving.send_replace(false);
        }
    }
}

/// A simulated differential-drive base.
///
/// Created with [`SimDrive::start`], which spawns the integration task on the
/// current Tokio runtime.  The task exits on its own once the drive is
/// dropped.
pub struct SimDrive {
    shared: Arc<Shared>,
}

impl SimDrive {
    /// Spawn the integration task and return the drive.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: SimDriveConfig) -> Self {
        let (moving, _) = watch::channel(false);
        let step = config.step;
        info!(
            wheel_diameter = config.geometry.wheel_diameter,
            wheel_offset = config.geometry.wheel_offset,
            linear_speed = config.linear_speed(),
            "starting simulated drive"
        );
        let shared = Arc::new(Shared {
            state: Mutex::new(DriveState {
                pose: config.initial_pose,
                motion: Motion::Idle,
            }),
            config,
            moving,
            motion_starts: AtomicU64::new(0),
            stops: AtomicU64::new(0),
            fault: Mutex::new(None),
        });
        tokio::spawn(integrate(Arc::downgrade(&shared), step));
        Self { shared }
    }

    pub fn is_moving(&self) -> bool {
        *self.shared.moving.borrow()
    }

    /// Number of motions started so far.
    pub fn motion_starts(&self) -> u64 {
        self.shared.motion_starts.load(Ordering::SeqCst)
    }

    /// Number of `stop` calls so far.
    pub fn stops(&self) -> u64 {
        self.shared.stops.load(Ordering::SeqCst)
    }

    /// Make the next motion start fail with a [`RoverError::HardwareFault`].
    pub fn inject_fault(&self, details: impl Into<String>) {
        *self.shared.fault.lock() = Some(details.into());
    }
}

async fn integrate(shared: Weak<Shared>, step: Duration) {
    let mut ticker = tokio::time::interval(step);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();
    loop {
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        let now = Instant::now();
        shared.advance((now - last).as_secs_f32());
        last = now;
    }
    debug!("simulated drive dropped; integration task exiting");
}

impl PoseSource for SimDrive {
    fn current_pose(&self) -> Pose {
        self.shared.state.lock().pose
    }
}

#[async_trait]
impl Drive for SimDrive {
    async fn forward(&self) -> Result<(), RoverError> {
        self.shared.begin(Motion::Linear { direction: 1.0 })
    }

    async fn backward(&self) -> Result<(), RoverError> {
        self.shared.begin(Motion::Linear { direction: -1.0 })
    }

    async fn turn_left(&self) -> Result<(), RoverError> {
        self.shared.begin(Motion::Rotate { remaining_deg: 360.0 })
    }

    async fn turn_right(&self) -> Result<(), RoverError> {
        self.shared.begin(Motion::Rotate { remaining_deg: -360.0 })
    }

    async fn follow_route(&self, route: &Route) -> Result<(), RoverError> {
        let targets = route.iter().map(|w| w.point()).collect();
        self.shared.begin(Motion::Route { targets })
    }

    async fn stop(&self) -> Result<(), RoverError> {
        self.shared.halt();
        Ok(())
    }

    async fn wait_for_stop(&self) -> Result<(), RoverError> {
        let mut rx = self.shared.moving.subscribe();
        let stopped = rx.wait_for(|moving| !*moving).await.is_ok();
        if stopped {
            Ok(())
        } else {
            Err(RoverError::HardwareFault {
                component: "sim_drive".to_string(),
                details: "motion state channel closed".to_string(),
            })
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated distance sensor
// ────────────────────────────────────────────────────────────────────────────

/// A range finder whose reading is set by the caller.
///
/// Clones share the same reading, so a test can keep a handle and move an
/// "object" in front of the robot while the supervisor owns another.
#[derive(Clone)]
pub struct SimDistanceSensor {
    id: String,
    reading_bits: Arc<AtomicU32>,
    failing: Arc<AtomicBool>,
}

impl SimDistanceSensor {
    /// A sensor that sees nothing (`f32::INFINITY`).
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reading_bits: Arc::new(AtomicU32::new(f32::INFINITY.to_bits())),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_distance(&self, distance: f32) {
        self.reading_bits.store(distance.to_bits(), Ordering::SeqCst);
    }

    /// Make subsequent reads fail until called again with `false`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl DistanceSensor for SimDistanceSensor {
    fn id(&self) -> &str {
        &self.id
    }

    fn distance(&self) -> Result<f32, RoverError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RoverError::Sensor {
                sensor: self.id.clone(),
                details: "simulated read failure".to_string(),
            });
        }
        Ok(f32::from_bits(self.reading_bits.load(Ordering::SeqCst)))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated camera
// ────────────────────────────────────────────────────────────────────────────

/// A camera that returns JPEG-framed synthetic payloads
/// (`SOI`, a sequence number, filler, `EOI`).
pub struct SimCamera {
    id: String,
    width: u32,
    height: u32,
    payload_len: usize,
    sequence: u32,
}

impl SimCamera {
    pub fn new(id: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            payload_len: 256,
            sequence: 0,
        }
    }

    /// Override the filler length of each frame.
    pub fn with_payload_len(mut self, payload_len: usize) -> Self {
        self.payload_len = payload_len;
        self
    }
}

impl Camera for SimCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<CameraFrame, RoverError> {
        self.sequence = self.sequence.wrapping_add(1);
        let mut buf = BytesMut::with_capacity(self.payload_len + 8);
        buf.put_slice(&[0xFF, 0xD8]);
        buf.put_u32(self.sequence);
        buf.put_bytes((self.sequence & 0xFF) as u8, self.payload_len);
        buf.put_slice(&[0xFF, 0xD9]);
        Ok(CameraFrame {
            width: self.width,
            height: self.height,
            jpeg: buf.freeze(),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
