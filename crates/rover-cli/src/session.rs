//! One client session: capabilities, supervisor, video and the command loop.

use std::sync::Arc;

use rover_hal::{SimCamera, SimDistanceSensor, SimDrive};
use rover_kernel::{ActionSupervisor, Capabilities, DispatchOutcome};
use rover_middleware::{CommandReader, TelemetrySink, VideoStats, VideoStreamer};
use rover_perception::{DirectRoutePlanner, ObstacleDetector};
use rover_types::{RobotConfig, RoverError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Config;

pub struct Session {
    supervisor: ActionSupervisor,
    sink: Arc<TelemetrySink>,
    video_token: CancellationToken,
    video: JoinHandle<VideoStats>,
    shutdown: CancellationToken,
}

impl Session {
    /// Bring up the simulated capabilities and start streaming video.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<W>(
        cfg: &Config,
        geometry: RobotConfig,
        telemetry: W,
        shutdown: CancellationToken,
    ) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let drive = Arc::new(SimDrive::start(cfg.sim_drive_config(geometry)));
        let map = Arc::new(cfg.map.clone());
        let detector = ObstacleDetector::new(
            Arc::new(SimDistanceSensor::new("front_ir")),
            drive.clone(),
            Arc::clone(&map),
        )
        .with_distance_threshold(cfg.obstacles.distance_threshold)
        .with_probe_length(cfg.obstacles.probe_length);
        let planner = DirectRoutePlanner::with_clearance(&map, cfg.obstacles.planner_clearance);

        let caps = Capabilities {
            drive,
            route_obstacles: Arc::new(detector.clone().range_only()),
            obstacles: Arc::new(detector),
            planner: Arc::new(planner),
        };

        let sink = Arc::new(TelemetrySink::new(telemetry));
        let supervisor =
            ActionSupervisor::new(caps, Arc::clone(&sink), cfg.supervisor_config())
                .with_shutdown_token(shutdown.child_token());

        let camera = SimCamera::new("front_rgb", cfg.video.width, cfg.video.height);
        let video_token = shutdown.child_token();
        let video = VideoStreamer::new(Box::new(camera), Arc::clone(&sink))
            .with_fps(cfg.video.fps)
            .spawn(video_token.clone());

        Self {
            supervisor,
            sink,
            video_token,
            video,
            shutdown,
        }
    }

    /// Run the command loop until end-of-program, shutdown or a transport
    /// error, then release everything.
    pub async fn run<R>(mut self, mut commands: CommandReader<R>) -> Result<(), RoverError>
    where
        R: AsyncRead + Unpin,
    {
        let result = self.command_loop(&mut commands).await;
        if let Err(e) = &result {
            error!(error = %e, "control channel lost");
        }
        self.teardown().await;
        result
    }

    #[instrument(skip_all)]
    async fn command_loop<R>(&mut self, commands: &mut CommandReader<R>) -> Result<(), RoverError>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            let command = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("shutdown requested");
                    return Ok(());
                }
                next = commands.next_command() => next?,
            };

            match self.supervisor.dispatch(command).await {
                DispatchOutcome::Shutdown => {
                    info!("end of program requested by client");
                    return Ok(());
                }
                DispatchOutcome::Finished { id, state } => {
                    debug!(action = %id, state = %state, "action finished during dispatch");
                }
                DispatchOutcome::Running(_) | DispatchOutcome::Idle => {}
            }
        }
    }

    async fn teardown(mut self) {
        self.supervisor.shutdown().await;

        self.video_token.cancel();
        match self.video.await {
            Ok(stats) => debug!(?stats, "video streamer joined"),
            Err(e) => warn!(error = %e, "video streamer did not exit cleanly"),
        }

        if let Err(e) = self.sink.close().await {
            warn!(error = %e, "closing telemetry stream failed");
        }
    }
}
