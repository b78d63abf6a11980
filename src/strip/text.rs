//! Header and footer text, traced from font outlines into tiny-skia paths.

use std::path::Path;

use ab_glyph::{Font, FontArc, GlyphId, OutlineCurve, Point};
use anyhow::{anyhow, Context, Result};
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Transform};

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

pub struct TextPainter {
    font: FontArc,
}

impl TextPainter {
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read font {}", path.display()))?;
        let font = FontArc::try_from_vec(data)
            .map_err(|e| anyhow!("Invalid font {}: {}", path.display(), e))?;
        Ok(Self { font })
    }

    /// Use the configured font, else the first usable system font.
    pub fn discover(configured: Option<&Path>) -> Option<Self> {
        if let Some(path) = configured {
            match Self::from_file(path) {
                Ok(painter) => return Some(painter),
                Err(e) => tracing::warn!("{:#}", e),
            }
        }

        for candidate in FONT_CANDIDATES.iter().map(Path::new) {
            if !candidate.exists() {
                continue;
            }
            if let Ok(painter) = Self::from_file(candidate) {
                tracing::debug!("Using font {}", candidate.display());
                return Some(painter);
            }
        }

        tracing::warn!("No usable font found, strip text will be omitted");
        None
    }

    /// Fill `text` with its left edge at `x` and baseline at `baseline`.
    /// `size` is the em size in pixels.
    pub fn draw(&self, pixmap: &mut Pixmap, text: &str, x: f32, baseline: f32, size: f32, color: Color) {
        let units = self
            .font
            .units_per_em()
            .unwrap_or_else(|| self.font.height_unscaled());
        let scale = size / units;

        let mut builder = PathBuilder::new();
        let mut caret = x;
        let mut previous: Option<GlyphId> = None;

        for ch in text.chars() {
            let id = self.font.glyph_id(ch);
            if let Some(prev) = previous {
                caret += self.font.kern_unscaled(prev, id) * scale;
            }
            if let Some(outline) = self.font.outline(id) {
                trace(&mut builder, &outline.curves, caret, baseline, scale);
            }
            caret += self.font.h_advance_unscaled(id) * scale;
            previous = Some(id);
        }

        let Some(path) = builder.finish() else {
            return;
        };

        let mut paint = Paint::default();
        paint.set_color(color);
        paint.anti_alias = true;
        pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }
}

/// Append glyph contours. Font units are y-up, the pixmap is y-down.
fn trace(builder: &mut PathBuilder, curves: &[OutlineCurve], x: f32, baseline: f32, scale: f32) {
    let map = |p: Point| (x + p.x * scale, baseline - p.y * scale);
    let mut pen: Option<Point> = None;

    for curve in curves {
        let (start, end) = match *curve {
            OutlineCurve::Line(a, b) => (a, b),
            OutlineCurve::Quad(a, _, b) => (a, b),
            OutlineCurve::Cubic(a, _, _, b) => (a, b),
        };

        if pen != Some(start) {
            if pen.is_some() {
                builder.close();
            }
            let (sx, sy) = map(start);
            builder.move_to(sx, sy);
        }

        match *curve {
            OutlineCurve::Line(_, b) => {
                let (bx, by) = map(b);
                builder.line_to(bx, by);
            }
            OutlineCurve::Quad(_, c, b) => {
                let (cx, cy) = map(c);
                let (bx, by) = map(b);
                builder.quad_to(cx, cy, bx, by);
            }
            OutlineCurve::Cubic(_, c1, c2, b) => {
                let (c1x, c1y) = map(c1);
                let (c2x, c2y) = map(c2);
                let (bx, by) = map(b);
                builder.cubic_to(c1x, c1y, c2x, c2y, bx, by);
            }
        }

        pen = Some(end);
    }

    if pen.is_some() {
        builder.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_font_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-font.ttf");
        std::fs::write(&path, b"plain text").unwrap();

        assert!(TextPainter::from_file(&path).is_err());
    }

    #[test]
    fn traced_square_is_closed_and_flipped() {
        let square = [
            OutlineCurve::Line(Point { x: 0.0, y: 0.0 }, Point { x: 10.0, y: 0.0 }),
            OutlineCurve::Line(Point { x: 10.0, y: 0.0 }, Point { x: 10.0, y: 10.0 }),
            OutlineCurve::Line(Point { x: 10.0, y: 10.0 }, Point { x: 0.0, y: 10.0 }),
            OutlineCurve::Line(Point { x: 0.0, y: 10.0 }, Point { x: 0.0, y: 0.0 }),
        ];
        let mut builder = PathBuilder::new();
        trace(&mut builder, &square, 5.0, 50.0, 2.0);
        let path = builder.finish().unwrap();

        let bounds = path.bounds();
        assert_eq!(bounds.left(), 5.0);
        assert_eq!(bounds.right(), 25.0);
        assert_eq!(bounds.top(), 30.0);
        assert_eq!(bounds.bottom(), 50.0);
    }
}
