use super::{CameraBackend, StreamRequest, VideoStream};
use anyhow::{Context, Result};
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;

/// Native webcam opened through nokhwa
pub struct WebcamBackend {
    device_index: u32,
}

impl WebcamBackend {
    pub fn new(device_index: u32) -> Self {
        Self { device_index }
    }
}

pub struct WebcamStream {
    camera: Camera,
    width: u32,
    height: u32,
}

impl CameraBackend for WebcamBackend {
    type Stream = WebcamStream;

    fn request_stream(&mut self, request: &StreamRequest) -> Result<WebcamStream> {
        tracing::info!(
            "Requesting webcam {} at {}x{}",
            self.device_index,
            request.width,
            request.height
        );

        let index = CameraIndex::Index(self.device_index);
        let target = CameraFormat::new(
            Resolution::new(request.width, request.height),
            FrameFormat::MJPEG,
            30,
        );
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(target));

        let mut camera = Camera::new(index, requested)
            .context("Failed to open camera")?;

        camera.open_stream()
            .context("Failed to open camera stream")?;

        let resolution = camera.resolution();
        tracing::info!(
            "Webcam streaming at {}x{}",
            resolution.width(),
            resolution.height()
        );

        Ok(WebcamStream {
            camera,
            width: resolution.width(),
            height: resolution.height(),
        })
    }
}

impl VideoStream for WebcamStream {
    fn resolution(&self) -> Option<(u32, u32)> {
        if self.width == 0 || self.height == 0 {
            None
        } else {
            Some((self.width, self.height))
        }
    }

    fn capture_frame(&mut self) -> Result<RgbImage> {
        let frame = self
            .camera
            .frame()
            .context("Failed to capture frame")?;

        let decoded = frame.decode_image::<RgbFormat>()
            .context("Failed to decode frame")?;

        Ok(decoded)
    }
}

impl Drop for WebcamStream {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            tracing::warn!("Failed to stop webcam stream: {}", e);
        }
    }
}
