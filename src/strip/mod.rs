//! Photo strip assembly: stacked stills between a branded header and a
//! timestamped footer, inside a thin border.

mod text;

pub use text::TextPainter;

use chrono::{DateTime, Local};
use futures::future::try_join_all;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use tiny_skia::{Color, ColorU8, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke, Transform};

use crate::capture::CapturedStill;
use crate::config::{BoothConfig, OutputConfig, StripConfig};
use crate::error::{BoothError, Result};
use crate::imaging::{self, EncodedImage, ImageSource};

const TEXT_LEFT: f32 = 28.0;

/// The assembled deliverable of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoStrip {
    image: EncodedImage,
    width: u32,
    height: u32,
    produced_at: DateTime<Local>,
}

impl PhotoStrip {
    pub(crate) fn new(image: EncodedImage, width: u32, height: u32, produced_at: DateTime<Local>) -> Self {
        Self {
            image,
            width,
            height,
            produced_at,
        }
    }

    pub fn image(&self) -> &EncodedImage {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn produced_at(&self) -> DateTime<Local> {
        self.produced_at
    }
}

/// Vertical geometry of a strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripLayout {
    pub width: u32,
    pub photo_height: u32,
    pub gap: u32,
    pub header_height: u32,
    pub footer_height: u32,
    pub count: u32,
}

impl StripLayout {
    /// Photo height follows the aspect ratio of the first still.
    pub fn new(config: &StripConfig, first: (u32, u32), count: u32) -> Self {
        let (w, h) = first;
        let photo_height = if w == 0 {
            0
        } else {
            (f64::from(config.width) * f64::from(h) / f64::from(w)).round() as u32
        };

        Self {
            width: config.width,
            photo_height,
            gap: config.gap,
            header_height: config.header_height,
            footer_height: config.footer_height,
            count,
        }
    }

    pub fn total_height(&self) -> u32 {
        self.header_height
            + self.count * self.photo_height
            + self.count.saturating_sub(1) * self.gap
            + self.footer_height
    }

    /// Top edge of photo `index`.
    pub fn photo_offset(&self, index: u32) -> u32 {
        self.header_height + index * (self.photo_height + self.gap)
    }
}

pub struct StripAssembler {
    config: StripConfig,
    output: OutputConfig,
    text: Option<TextPainter>,
}

impl StripAssembler {
    pub fn new(config: StripConfig, output: OutputConfig) -> Self {
        let text = TextPainter::discover(config.font_path.as_deref());
        Self {
            config,
            output,
            text,
        }
    }

    pub fn from_config(config: &BoothConfig) -> Self {
        Self::new(config.strip.clone(), config.output.clone())
    }

    /// Lay out `stills` top to bottom and encode the result.
    ///
    /// Every still is drawn at the first still's aspect ratio.
    pub async fn assemble(
        &self,
        stills: &[CapturedStill],
        produced_at: DateTime<Local>,
    ) -> Result<PhotoStrip> {
        if stills.is_empty() {
            return Err(BoothError::Capture("no stills to assemble".into()));
        }

        let photos = try_join_all(
            stills
                .iter()
                .map(|still| imaging::load_image(ImageSource::Encoded(still.image().clone()))),
        )
        .await
        .map_err(|e| BoothError::Capture(format!("{:#}", e)))?;

        let layout = StripLayout::new(&self.config, photos[0].dimensions(), photos.len() as u32);
        tracing::info!(
            "Assembling {} photos into {}x{} strip",
            layout.count,
            layout.width,
            layout.total_height()
        );

        let stamp = produced_at.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string();
        let canvas = self.render(&photos, &layout, &stamp)?;
        let image = imaging::encode(&canvas, &self.output)
            .map_err(|e| BoothError::Capture(format!("{:#}", e)))?;

        Ok(PhotoStrip::new(image, layout.width, layout.total_height(), produced_at))
    }

    fn render(&self, photos: &[RgbaImage], layout: &StripLayout, stamp: &str) -> Result<RgbaImage> {
        let _span = tracing::debug_span!("render_strip").entered();
        let width = layout.width;
        let height = layout.total_height();
        let c = &self.config;

        let mut pixmap = Pixmap::new(width, height)
            .ok_or_else(|| BoothError::Capture(format!("cannot allocate {}x{} strip", width, height)))?;
        pixmap.fill(color(c.background));

        // Header band
        fill_rect(&mut pixmap, 0.0, 0.0, width as f32, c.header_height as f32, c.header_color);
        self.label(&mut pixmap, &c.title, 68.0, 52.0, c.text_color);
        self.label(&mut pixmap, &c.subtitle, 108.0, 36.0, c.text_color);

        for (i, photo) in photos.iter().enumerate() {
            let scaled = if photo.dimensions() == (width, layout.photo_height) {
                photo.clone()
            } else {
                imageops::resize(photo, width, layout.photo_height, FilterType::Triangle)
            };
            let Some(tile) = to_pixmap(&scaled) else {
                continue;
            };
            pixmap.draw_pixmap(
                0,
                layout.photo_offset(i as u32) as i32,
                tile.as_ref(),
                &PixmapPaint::default(),
                Transform::identity(),
                None,
            );
        }

        // Footer band
        let footer_top = (height - layout.footer_height) as f32;
        fill_rect(&mut pixmap, 0.0, footer_top, width as f32, layout.footer_height as f32, c.footer_color);
        self.label(&mut pixmap, &c.caption, height as f32 - 92.0, 34.0, c.text_color);
        self.label(&mut pixmap, stamp, height as f32 - 52.0, 22.0, c.timestamp_color);

        // Border
        let inset = c.border_inset;
        if let Some(rect) = Rect::from_xywh(
            inset,
            inset,
            width as f32 - 2.0 * inset,
            height as f32 - 2.0 * inset,
        ) {
            let path = PathBuilder::from_rect(rect);
            let mut paint = Paint::default();
            paint.set_color(color(c.border_color));
            let stroke = Stroke {
                width: c.border_width,
                ..Stroke::default()
            };
            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }

        Ok(from_pixmap(&pixmap))
    }

    fn label(&self, pixmap: &mut Pixmap, text: &str, baseline: f32, size: f32, rgba: [u8; 4]) {
        if let Some(painter) = &self.text {
            painter.draw(pixmap, text, TEXT_LEFT, baseline, size, color(rgba));
        }
    }
}

fn color([r, g, b, a]: [u8; 4]) -> Color {
    Color::from_rgba8(r, g, b, a)
}

fn fill_rect(pixmap: &mut Pixmap, x: f32, y: f32, w: f32, h: f32, rgba: [u8; 4]) {
    if let Some(rect) = Rect::from_xywh(x, y, w, h) {
        let mut paint = Paint::default();
        paint.set_color(color(rgba));
        pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    }
}

fn to_pixmap(image: &RgbaImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(image.width(), image.height())?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        *dst = ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
    }
    Some(pixmap)
}

fn from_pixmap(pixmap: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = image::Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraAcquirer, StreamRequest};
    use crate::capture::FrameCapturer;
    use crate::config::OverlayPolicy;
    use crate::test_support::FakeCamera;
    use std::path::Path;
    use std::time::Duration;

    fn layout(count: u32) -> StripLayout {
        StripLayout::new(&StripConfig::default(), (1280, 720), count)
    }

    #[test]
    fn photo_height_follows_first_aspect_ratio() {
        assert_eq!(layout(3).photo_height, 506);
        assert_eq!(StripLayout::new(&StripConfig::default(), (640, 480), 1).photo_height, 675);
    }

    #[test]
    fn total_height_grows_linearly_with_count() {
        assert_eq!(layout(1).total_height(), 120 + 506 + 160);
        assert_eq!(layout(3).total_height(), 120 + 3 * 506 + 2 * 20 + 160);
        for n in 1..6 {
            assert_eq!(layout(n + 1).total_height() - layout(n).total_height(), 506 + 20);
        }
    }

    #[test]
    fn photo_offsets_step_by_height_plus_gap() {
        let layout = layout(3);
        assert_eq!(layout.photo_offset(0), 120);
        assert_eq!(layout.photo_offset(2), 120 + 2 * (506 + 20));
        assert_eq!(
            layout.photo_offset(2) + layout.photo_height + layout.footer_height,
            layout.total_height()
        );
    }

    async fn still(rgb: [u8; 3]) -> CapturedStill {
        let camera = CameraAcquirer::new(
            FakeCamera::solid(90, 60, rgb),
            StreamRequest {
                width: 90,
                height: 60,
            },
            Duration::from_secs(1),
        );
        assert!(camera.acquire().await.is_ready());
        FrameCapturer::new(OverlayPolicy::Tolerant, Duration::ZERO, OutputConfig::default())
            .capture(&camera, Path::new("/missing/overlay.png"))
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn empty_input_is_rejected() {
        let assembler = StripAssembler::new(StripConfig::default(), OutputConfig::default());
        let err = assembler.assemble(&[], Local::now()).await.unwrap_err();
        assert!(matches!(err, BoothError::Capture(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn header_and_background_colours() {
        let assembler = StripAssembler::new(StripConfig::default(), OutputConfig::default());
        let produced_at = Local::now();
        let strip = assembler
            .assemble(&[still([9, 9, 9]).await], produced_at)
            .await
            .unwrap();
        assert_eq!(strip.produced_at(), produced_at);
        let image = imaging::load_image(ImageSource::Encoded(strip.image().clone()))
            .await
            .unwrap();

        // 900 * 60 / 90 = 600
        assert_eq!(strip.dimensions(), (900, 120 + 600 + 160));
        assert_eq!(image.dimensions(), strip.dimensions());
        // Right edge of the header, clear of text and border
        assert_eq!(image.get_pixel(899, 60), &image::Rgba([0x6b, 0x10, 0x20, 255]));
        assert_eq!(image.get_pixel(450, 400), &image::Rgba([9, 9, 9, 255]));
    }
}
