//! Camera → telemetry producer.
//!
//! Runs for the lifetime of a session, independent of any action.  Video is
//! best effort: a failed write drops that frame and the stream carries on.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{Quota, RateLimiter};
use rover_hal::{Camera, CameraFrame};
use rover_types::{RoverError, TelemetryFrame};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::sink::TelemetrySink;

/// Default frame rate.
pub const DEFAULT_FPS: u32 = 15;

/// Pause after a failed capture before trying again.
pub const DEFAULT_CAPTURE_BACKOFF: Duration = Duration::from_millis(200);

/// Counters returned when the streamer stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoStats {
    pub sent: u64,
    pub skipped_empty: u64,
    pub dropped: u64,
    pub capture_errors: u64,
}

/// Captures frames at a fixed rate and submits them to the sink.
pub struct VideoStreamer {
    camera: Box<dyn Camera>,
    sink: Arc<TelemetrySink>,
    fps: u32,
    capture_backoff: Duration,
}

impl VideoStreamer {
    pub fn new(camera: Box<dyn Camera>, sink: Arc<TelemetrySink>) -> Self {
        Self {
            camera,
            sink,
            fps: DEFAULT_FPS,
            capture_backoff: DEFAULT_CAPTURE_BACKOFF,
        }
    }

    /// Set the frame rate.  Zero is clamped to one frame per second.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_capture_backoff(mut self, backoff: Duration) -> Self {
        self.capture_backoff = backoff;
        self
    }

    /// Start streaming on a new task until `token` is cancelled.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<VideoStats> {
        tokio::spawn(self.run(token))
    }

    async fn run(self, token: CancellationToken) -> VideoStats {
        let Self {
            camera,
            sink,
            fps,
            capture_backoff,
        } = self;
        let camera_id = camera.id().to_string();
        let fps = NonZeroU32::new(fps).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_second(fps));
        let mut camera = Some(camera);
        let mut stats = VideoStats::default();

        info!(camera = %camera_id, fps = fps.get(), "video streamer started");

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = limiter.until_ready() => {}
            }

            let Some(cam) = camera.take() else { break };
            let (cam, captured) = match capture_blocking(cam).await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(camera = %camera_id, error = %e, "capture task failed; stopping video");
                    break;
                }
            };
            camera = Some(cam);

            let frame = match captured {
                Ok(frame) => frame,
                Err(e) => {
                    stats.capture_errors += 1;
                    warn!(camera = %camera_id, error = %e, "capture failed");
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(capture_backoff) => continue,
                    }
                }
            };
            if frame.is_empty() {
                stats.skipped_empty += 1;
                continue;
            }

            match sink.submit(&TelemetryFrame::VideoFrame(frame.jpeg)).await {
                Ok(()) => stats.sent += 1,
                Err(RoverError::SinkClosed) => {
                    debug!("telemetry sink closed; video streamer exiting");
                    break;
                }
                Err(e) => {
                    stats.dropped += 1;
                    warn!(error = %e, "video frame dropped");
                }
            }
        }

        info!(
            camera = %camera_id,
            sent = stats.sent,
            dropped = stats.dropped,
            capture_errors = stats.capture_errors,
            "video streamer stopped"
        );
        stats
    }
}

type CaptureResult = (Box<dyn Camera>, Result<CameraFrame, RoverError>);

async fn capture_blocking(mut camera: Box<dyn Camera>) -> Result<CaptureResult, tokio::task::JoinError> {
    tokio::task::spawn_blocking(move || {
        let frame = camera.capture();
        (camera, frame)
    })
    .await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use bytes::Bytes;
    use rover_hal::SimCamera;
    use tokio::io::duplex;

    use super::*;
    use crate::wire::read_frame;

    #[tokio::test]
    async fn streams_frames_until_cancelled() {
        let (writer, mut reader) = duplex(64 * 1024);
        let sink = Arc::new(TelemetrySink::new(writer));
        let camera = SimCamera::new("front_rgb", 160, 120).with_payload_len(64);
        let token = CancellationToken::new();

        let handle = VideoStreamer::new(Box::new(camera), Arc::clone(&sink))
            .with_fps(100)
            .spawn(token.clone());

        for _ in 0..3 {
            match read_frame(&mut reader).await.unwrap() {
                TelemetryFrame::VideoFrame(jpeg) => {
                    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
                    assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
                }
                other => panic!("unexpected frame {other:?}"),
            }
        }

        token.cancel();
        let stats = handle.await.unwrap();
        assert!(stats.sent >= 3);
        assert_eq!(stats.capture_errors, 0);
    }

    struct FlakyCamera {
        calls: Arc<AtomicU32>,
    }

    impl Camera for FlakyCamera {
        fn id(&self) -> &str {
            "flaky"
        }

        fn capture(&mut self) -> Result<CameraFrame, RoverError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            match n % 3 {
                0 => Err(RoverError::HardwareFault {
                    component: "flaky".into(),
                    details: "buffer unavailable".into(),
                }),
                1 => Ok(CameraFrame {
                    width: 0,
                    height: 0,
                    jpeg: Bytes::new(),
                }),
                _ => Ok(CameraFrame {
                    width: 1,
                    height: 1,
                    jpeg: Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]),
                }),
            }
        }
    }

    #[tokio::test]
    async fn capture_errors_and_empty_frames_are_skipped() {
        let sink = Arc::new(TelemetrySink::new(tokio::io::sink()));
        let calls = Arc::new(AtomicU32::new(0));
        let token = CancellationToken::new();

        let handle = VideoStreamer::new(
            Box::new(FlakyCamera {
                calls: Arc::clone(&calls),
            }),
            Arc::clone(&sink),
        )
        .with_fps(200)
        .with_capture_backoff(Duration::from_millis(1))
        .spawn(token.clone());

        while sink.video_frames_written() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        token.cancel();
        let stats = handle.await.unwrap();

        assert!(stats.capture_errors >= 2);
        assert!(stats.skipped_empty >= 1);
        assert_eq!(stats.sent, sink.video_frames_written());
    }

    #[tokio::test]
    async fn write_failures_drop_frames_and_keep_running() {
        let (writer, reader) = duplex(64);
        drop(reader);
        let sink = Arc::new(TelemetrySink::new(writer));
        let token = CancellationToken::new();

        let handle = VideoStreamer::new(Box::new(SimCamera::new("cam", 8, 8)), sink)
            .with_fps(200)
            .spawn(token.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        token.cancel();
        let stats = handle.await.unwrap();
        assert!(stats.dropped >= 1);
        assert_eq!(stats.sent, 0);
    }

    #[tokio::test]
    async fn closed_sink_stops_the_streamer() {
        let sink = Arc::new(TelemetrySink::new(tokio::io::sink()));
        sink.close().await.unwrap();
        let handle = VideoStreamer::new(Box::new(SimCamera::new("cam", 8, 8)), sink)
            .spawn(CancellationToken::new());
        let stats = handle.await.unwrap();
        assert_eq!(stats.sent, 0);
    }
}
