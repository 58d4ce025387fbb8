//! Serialised telemetry output.
//!
//! Every producer (the position ticker of the running action, the video
//! streamer) writes through one [`TelemetrySink`].  A frame is encoded up
//! front and written whole while the sink's lock is held, so frames from
//! different producers never interleave on the wire.  The lock is Tokio's
//! FIFO-fair mutex: waiting producers are served in arrival order.

use std::sync::atomic::{AtomicU64, Ordering};

use rover_types::{RoverError, TelemetryFrame};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::wire::encode_frame;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// The single writer of the robot → client stream.
pub struct TelemetrySink {
    writer: Mutex<Option<BoxedWriter>>,
    positions: AtomicU64,
    video_frames: AtomicU64,
}

impl TelemetrySink {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            writer: Mutex::new(Some(Box::new(writer))),
            positions: AtomicU64::new(0),
            video_frames: AtomicU64::new(0),
        }
    }

    /// Write one complete frame and flush it.
    ///
    /// # Errors
    ///
    /// [`RoverError::SinkClosed`] after [`close`](Self::close);
    /// [`RoverError::Io`] when the write itself fails.
    pub async fn submit(&self, frame: &TelemetryFrame) -> Result<(), RoverError> {
        let bytes = encode_frame(frame);
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(RoverError::SinkClosed)?;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        drop(guard);

        match frame {
            TelemetryFrame::Position(_) => self.positions.fetch_add(1, Ordering::Relaxed),
            TelemetryFrame::VideoFrame(_) => self.video_frames.fetch_add(1, Ordering::Relaxed),
        };
        Ok(())
    }

    /// Take the writer out and shut it down.
    ///
    /// A frame already being written completes first.  Closing twice is a
    /// no-op.
    pub async fn close(&self) -> Result<(), RoverError> {
        let taken = self.writer.lock().await.take();
        let Some(mut writer) = taken else {
            debug!("telemetry sink already closed");
            return Ok(());
        };
        writer.shutdown().await?;
        info!(
            positions = self.positions_written(),
            video_frames = self.video_frames_written(),
            "telemetry sink closed"
        );
        Ok(())
    }

    pub async fn is_closed(&self) -> bool {
        self.writer.lock().await.is_none()
    }

    /// Position frames written so far.
    pub fn positions_written(&self) -> u64 {
        self.positions.load(Ordering::Relaxed)
    }

    /// Video frames written so far.
    pub fn video_frames_written(&self) -> u64 {
        self.video_frames.load(Ordering::Relaxed)
    }
}
