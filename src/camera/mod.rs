mod acquirer;
mod still;
#[cfg(feature = "webcam")]
mod webcam;

pub use acquirer::{CameraAcquirer, CameraStatus};
pub use still::{StillCamera, StillStream};
#[cfg(feature = "webcam")]
pub use webcam::{WebcamBackend, WebcamStream};

use anyhow::Result;
use image::RgbImage;

use crate::config::CameraConfig;

/// Parameters of a video stream request. Streams are video only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    pub width: u32,
    pub height: u32,
}

impl From<&CameraConfig> for StreamRequest {
    fn from(config: &CameraConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
        }
    }
}

/// Trait for devices that can hand out live video streams
pub trait CameraBackend {
    type Stream: VideoStream;

    /// Request a stream close to the target resolution
    fn request_stream(&mut self, request: &StreamRequest) -> Result<Self::Stream>;
}

/// Trait for a live video stream
pub trait VideoStream {
    /// Begin delivering frames
    fn start_playback(&mut self) -> Result<()> {
        Ok(())
    }

    /// Native frame size, or `None` while the stream has not reported it yet
    fn resolution(&self) -> Option<(u32, u32)>;

    /// Grab the current frame
    fn capture_frame(&mut self) -> Result<RgbImage>;
}
