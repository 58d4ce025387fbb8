//! Generic `Camera` trait and supporting types for image-capture hardware.

use bytes::Bytes;
use rover_types::RoverError;

/// A JPEG-encoded frame returned by a camera driver.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Encoded JPEG bytes, ready to be written to the wire.
    pub jpeg: Bytes,
}

impl CameraFrame {
    /// `true` when the grabber produced no data (e.g. the device was not
    /// ready yet).  Empty frames are never streamed.
    pub fn is_empty(&self) -> bool {
        self.jpeg.is_empty()
    }
}

/// A camera or image-capture device.
///
/// Capture is blocking; callers run it on a blocking thread.
pub trait Camera: Send + Sync {
    /// Stable identifier for this camera, e.g. `"front_rgb"`.
    fn id(&self) -> &str;

    /// Grab and encode the next available frame.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::HardwareFault`] if the frame cannot be captured
    /// (e.g. the device is disconnected or the buffer is unavailable).
    fn capture(&mut self) -> Result<CameraFrame, RoverError>;
}
