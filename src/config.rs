use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BoothError, Result};
use crate::overlay::Overlay;

/// How the session controller gets hold of the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CameraPolicy {
    /// The host must call `begin` first; `start` aborts when no camera is held.
    RequireBegin,
    /// `start` acquires the camera itself on first use.
    AcquireOnStart,
}

/// What happens when the selected overlay cannot be loaded during capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlayPolicy {
    /// Fail the capture.
    Strict,
    /// Keep the mirrored frame without the overlay.
    Tolerant,
}

/// Raster format for captured stills and the final strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
    pub policy: CameraPolicy,
    /// Upper bound on waiting for the stream to report its dimensions.
    pub metadata_timeout_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 1280,
            height: 720,
            policy: CameraPolicy::RequireBegin,
            metadata_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Directory overlay resources are resolved against.
    pub assets_dir: PathBuf,
    pub frames: Vec<Overlay>,
    pub policy: OverlayPolicy,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("."),
            frames: vec![
                Overlay::new("Gathering Classic", "assets/frames/frame-gathering-classic.png"),
                Overlay::new("Killough Maroon", "assets/frames/frame-killough-maroon.png"),
                Overlay::new("Farmers Night", "assets/frames/frame-farmers-night.png"),
                Overlay::new("Texas Star", "assets/frames/frame-texas-star.png"),
            ],
            policy: OverlayPolicy::Tolerant,
        }
    }
}

/// Layout, branding and colours of the assembled strip.
///
/// Colours are straight (non-premultiplied) RGBA.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StripConfig {
    pub width: u32,
    pub gap: u32,
    pub header_height: u32,
    pub footer_height: u32,
    pub title: String,
    pub subtitle: String,
    pub caption: String,
    pub background: [u8; 4],
    pub header_color: [u8; 4],
    pub footer_color: [u8; 4],
    pub text_color: [u8; 4],
    pub timestamp_color: [u8; 4],
    pub border_color: [u8; 4],
    pub border_inset: f32,
    pub border_width: f32,
    /// TrueType font for header and footer text. Common system fonts are
    /// tried when unset.
    pub font_path: Option<PathBuf>,
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            width: 900,
            gap: 20,
            header_height: 120,
            footer_height: 160,
            title: "THE GATHERING".to_string(),
            subtitle: "ON SUMMIT • LHS KILLOUGH".to_string(),
            caption: "GATHERING ON SUMMIT 2026".to_string(),
            background: [0x0b, 0x0b, 0x10, 255],
            header_color: [0x6b, 0x10, 0x20, 255],
            footer_color: [255, 255, 255, 15],
            text_color: [255, 255, 255, 255],
            timestamp_color: [255, 255, 255, 191],
            border_color: [255, 255, 255, 41],
            border_inset: 12.0,
            border_width: 8.0,
            font_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Encoder quality in percent, only used by lossy formats.
    pub quality: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Png,
            quality: 92,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Email relay endpoint. Email delivery is disabled when unset.
    pub url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 30,
        }
    }
}

/// Top-level booth configuration, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoothConfig {
    pub shots: u32,
    pub countdown_seconds: u32,
    pub tick_ms: u64,
    pub preroll_ms: u64,
    pub inter_shot_pause_ms: u64,
    /// Delay before capture when the stream has not reported its size yet.
    pub metadata_wait_ms: u64,
    pub camera: CameraConfig,
    pub overlays: OverlayConfig,
    pub strip: StripConfig,
    pub output: OutputConfig,
    pub relay: RelayConfig,
}

impl Default for BoothConfig {
    fn default() -> Self {
        Self {
            shots: 3,
            countdown_seconds: 3,
            tick_ms: 900,
            preroll_ms: 1000,
            inter_shot_pause_ms: 450,
            metadata_wait_ms: 200,
            camera: CameraConfig::default(),
            overlays: OverlayConfig::default(),
            strip: StripConfig::default(),
            output: OutputConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

impl BoothConfig {
    /// Load a config file. Missing keys take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading booth config from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| BoothError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.shots == 0 {
            return Err(BoothError::Config("shots must be at least 1".into()));
        }
        if self.overlays.frames.is_empty() {
            return Err(BoothError::Config("at least one overlay is required".into()));
        }
        if self.strip.width == 0 {
            return Err(BoothError::Config("strip width must be positive".into()));
        }
        if !(1..=100).contains(&self.output.quality) {
            return Err(BoothError::Config(format!(
                "output quality {} is outside 1..=100",
                self.output.quality
            )));
        }
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn preroll(&self) -> Duration {
        Duration::from_millis(self.preroll_ms)
    }

    pub fn inter_shot_pause(&self) -> Duration {
        Duration::from_millis(self.inter_shot_pause_ms)
    }

    pub fn metadata_wait(&self) -> Duration {
        Duration::from_millis(self.metadata_wait_ms)
    }
}
