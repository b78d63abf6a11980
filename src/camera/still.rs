use super::{CameraBackend, StreamRequest, VideoStream};
use anyhow::{Context, Result};
use image::RgbImage;
use std::path::PathBuf;

/// Camera stand-in that serves one image file as every frame.
///
/// Used for kiosks without a webcam and for rehearsing a layout.
pub struct StillCamera {
    path: PathBuf,
}

impl StillCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

pub struct StillStream {
    frame: RgbImage,
}

impl CameraBackend for StillCamera {
    type Stream = StillStream;

    fn request_stream(&mut self, _request: &StreamRequest) -> Result<StillStream> {
        tracing::info!("Serving still frames from {}", self.path.display());

        let frame = image::open(&self.path)
            .with_context(|| format!("Failed to open still frame {}", self.path.display()))?
            .to_rgb8();

        Ok(StillStream { frame })
    }
}

impl VideoStream for StillStream {
    fn resolution(&self) -> Option<(u32, u32)> {
        Some(self.frame.dimensions())
    }

    fn capture_frame(&mut self) -> Result<RgbImage> {
        Ok(self.frame.clone())
    }
}
