//! Configuration vault: reads/writes `~/.rover/config.toml`.
//!
//! Every field has a default, so a missing file, a missing section or a
//! missing key all fall back to the stock settings.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rover_hal::SimDriveConfig;
use rover_kernel::SupervisorConfig;
use rover_middleware::DEFAULT_PORT;
use rover_perception::ObstacleMap;
use rover_types::{Pose, RobotConfig, RoverError};
use serde::{Deserialize, Serialize};

/// Persisted server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// TCP port of the control channel.
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub video: VideoSettings,

    #[serde(default)]
    pub supervisor: SupervisorSettings,

    #[serde(default)]
    pub obstacles: ObstacleSettings,

    #[serde(default)]
    pub sim: SimSettings,

    /// Wall segments of the arena.
    #[serde(default = "ObstacleMap::reference_arena")]
    pub map: ObstacleMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            width: 160,
            height: 120,
            fps: 15,
        }
    }
}

/// Supervisor timings, in milliseconds on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSettings {
    pub tick_interval_ms: u64,
    pub watch_poll_ms: u64,
    pub join_timeout_ms: u64,
    pub navigate_obstacle_watch: bool,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            watch_poll_ms: 5,
            join_timeout_ms: 2000,
            navigate_obstacle_watch: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObstacleSettings {
    pub distance_threshold: f32,
    pub probe_length: f32,
    /// Extra length added to each wall end when planning.
    pub planner_clearance: f32,
}

impl Default for ObstacleSettings {
    fn default() -> Self {
        Self {
            distance_threshold: 100.0,
            probe_length: 17.0,
            planner_clearance: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    pub wheel_speed_deg_s: f32,
    pub angular_speed_deg_s: f32,
    pub initial_pose: Pose,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            wheel_speed_deg_s: 360.0,
            angular_speed_deg_s: 100.0,
            initial_pose: Pose::new(20.0, 20.0, 0.0),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            video: VideoSettings::default(),
            supervisor: SupervisorSettings::default(),
            obstacles: ObstacleSettings::default(),
            sim: SimSettings::default(),
            map: ObstacleMap::reference_arena(),
        }
    }
}

impl Config {
    pub fn supervisor_config(&self) -> SupervisorConfig {
        let s = &self.supervisor;
        SupervisorConfig {
            tick_interval: Duration::from_millis(s.tick_interval_ms.max(1)),
            watch_poll: Duration::from_millis(s.watch_poll_ms.max(1)),
            join_timeout: Duration::from_millis(s.join_timeout_ms),
            navigate_obstacle_watch: s.navigate_obstacle_watch,
        }
    }

    /// Simulated drive settings for a robot with the handshake's geometry.
    pub fn sim_drive_config(&self, geometry: RobotConfig) -> SimDriveConfig {
        SimDriveConfig {
            geometry,
            wheel_speed_deg_s: self.sim.wheel_speed_deg_s,
            angular_speed_deg_s: self.sim.angular_speed_deg_s,
            initial_pose: self.sim.initial_pose,
            ..SimDriveConfig::default()
        }
    }
}

/// Return the path to `~/.rover/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rover").join("config.toml")
}

/// Load the config from `path`.  Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, RoverError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        RoverError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| RoverError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `ROVER_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ROVER_PORT` | `port` |
/// | `ROVER_VIDEO_FPS` | `video.fps` |
/// | `ROVER_TICK_MS` | `supervisor.tick_interval_ms` |
/// | `ROVER_JOIN_TIMEOUT_MS` | `supervisor.join_timeout_ms` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Some(port) = env_parse("ROVER_PORT") {
        cfg.port = port;
    }
    if let Some(fps) = env_parse("ROVER_VIDEO_FPS") {
        cfg.video.fps = fps;
    }
    if let Some(ms) = env_parse("ROVER_TICK_MS") {
        cfg.supervisor.tick_interval_ms = ms;
    }
    if let Some(ms) = env_parse("ROVER_JOIN_TIMEOUT_MS") {
        cfg.supervisor.join_timeout_ms = ms;
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}

/// Write `cfg` to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), RoverError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            RoverError::Config(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| RoverError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw)
        .map_err(|e| RoverError::Config(format!("failed to write {}: {e}", path.display())))
}
