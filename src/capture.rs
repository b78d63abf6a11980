use std::path::Path;
use std::time::Duration;

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};

use crate::camera::{CameraAcquirer, CameraBackend, VideoStream};
use crate::config::{BoothConfig, OutputConfig, OverlayPolicy};
use crate::error::{BoothError, Result};
use crate::imaging::{self, EncodedImage, ImageSource};

/// One mirrored camera frame with the selected overlay burned in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedStill {
    image: EncodedImage,
    width: u32,
    height: u32,
}

impl CapturedStill {
    pub fn image(&self) -> &EncodedImage {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Turns the live stream into composited stills.
#[derive(Debug, Clone)]
pub struct FrameCapturer {
    overlay_policy: OverlayPolicy,
    metadata_wait: Duration,
    output: OutputConfig,
}

impl FrameCapturer {
    pub fn new(overlay_policy: OverlayPolicy, metadata_wait: Duration, output: OutputConfig) -> Self {
        Self {
            overlay_policy,
            metadata_wait,
            output,
        }
    }

    pub fn from_config(config: &BoothConfig) -> Self {
        Self::new(
            config.overlays.policy,
            config.metadata_wait(),
            config.output.clone(),
        )
    }

    /// Capture one still: the mirrored frame first, then the overlay on top.
    pub async fn capture<B: CameraBackend>(
        &self,
        camera: &CameraAcquirer<B>,
        overlay: &Path,
    ) -> Result<CapturedStill> {
        if !camera.is_ready() {
            return Err(BoothError::CameraNotStarted);
        }

        // Frame size can lag the stream start
        if camera.resolution().is_none() {
            tokio::time::sleep(self.metadata_wait).await;
        }
        let (width, height) = camera
            .resolution()
            .ok_or_else(|| BoothError::Capture("video dimensions unavailable".into()))?;

        let frame = camera
            .with_stream(|stream| stream.capture_frame())
            .ok_or(BoothError::CameraNotStarted)?
            .map_err(|e| BoothError::Capture(format!("{:#}", e)))?;

        let mut canvas = mirrored(DynamicImage::ImageRgb8(frame).to_rgba8(), width, height);

        match imaging::load_image(ImageSource::File(overlay.to_path_buf())).await {
            Ok(graphic) => {
                let graphic = fit_exact(graphic, width, height);
                imageops::overlay(&mut canvas, &graphic, 0, 0);
            }
            Err(e) => match self.overlay_policy {
                OverlayPolicy::Strict => {
                    return Err(BoothError::OverlayLoad {
                        path: overlay.to_path_buf(),
                        reason: format!("{:#}", e),
                    });
                }
                OverlayPolicy::Tolerant => {
                    tracing::warn!("Overlay unavailable, keeping bare frame: {:#}", e);
                }
            },
        }

        let image = imaging::encode(&canvas, &self.output)
            .map_err(|e| BoothError::Capture(format!("{:#}", e)))?;

        tracing::debug!("Captured {}x{} still ({} bytes)", width, height, image.bytes().len());

        Ok(CapturedStill {
            image,
            width,
            height,
        })
    }
}

/// Scale the frame to the stream's native size and flip it horizontally so it
/// matches the mirror-like preview.
fn mirrored(frame: RgbaImage, width: u32, height: u32) -> RgbaImage {
    let mut frame = fit_exact(frame, width, height);
    imageops::flip_horizontal_in_place(&mut frame);
    frame
}

/// Stretch to exactly `width` x `height`, ignoring aspect ratio.
fn fit_exact(image: RgbaImage, width: u32, height: u32) -> RgbaImage {
    if image.dimensions() == (width, height) {
        image
    } else {
        imageops::resize(&image, width, height, FilterType::Triangle)
    }
}
