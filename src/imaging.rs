//! Image loading and raster encoding shared by capture and strip assembly.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};

use crate::config::{OutputConfig, OutputFormat};

/// An encoded raster image. Cloning shares the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    format: OutputFormat,
    bytes: Arc<[u8]>,
}

impl EncodedImage {
    pub fn new(format: OutputFormat, bytes: Vec<u8>) -> Self {
        Self {
            format,
            bytes: bytes.into(),
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// `data:` URL form, as submitted to the email relay.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime_type(),
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Where a drawable bitmap comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    File(PathBuf),
    Encoded(EncodedImage),
}

/// Decode an image resource off the event loop.
pub async fn load_image(source: ImageSource) -> Result<RgbaImage> {
    tokio::task::spawn_blocking(move || decode(&source))
        .await
        .context("Image decode task was cancelled")?
}

fn decode(source: &ImageSource) -> Result<RgbaImage> {
    let _span = tracing::debug_span!("decode_image").entered();
    match source {
        ImageSource::File(path) => load_file(path),
        ImageSource::Encoded(encoded) => {
            let image = image::load_from_memory(encoded.bytes())
                .context("Failed to decode encoded image")?;
            Ok(image.to_rgba8())
        }
    }
}

fn load_file(path: &Path) -> Result<RgbaImage> {
    let image = image::open(path).with_context(|| format!("Failed to open image {}", path.display()))?;
    Ok(image.to_rgba8())
}

/// Encode an RGBA surface in the configured output format.
pub fn encode(image: &RgbaImage, output: &OutputConfig) -> Result<EncodedImage> {
    let _span = tracing::debug_span!("encode_image").entered();
    let (width, height) = image.dimensions();
    let mut bytes = Vec::new();

    match output.format {
        OutputFormat::Png => {
            PngEncoder::new(Cursor::new(&mut bytes))
                .write_image(image.as_raw(), width, height, ExtendedColorType::Rgba8)
                .context("Failed to encode PNG")?;
        }
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            JpegEncoder::new_with_quality(Cursor::new(&mut bytes), output.quality)
                .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                .context("Failed to encode JPEG")?;
        }
    }

    Ok(EncodedImage::new(output.format, bytes))
}
