//! Software raster surface backed by an [`RgbaImage`].

use std::path::Path;
use std::sync::OnceLock;

use ab_glyph::{point, Font, FontRef, Glyph, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use laneguard_core::geometry::Rect;
use laneguard_core::risk::Color;

use crate::surface::{Surface, GLYPH_ADVANCE};

/// Label font size in CSS pixels (em height).
pub const LABEL_FONT_PX: f32 = 14.0;

static LABEL_FONT_DATA: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");
static LABEL_FONT: OnceLock<Option<FontRef<'static>>> = OnceLock::new();

fn label_font() -> Option<&'static FontRef<'static>> {
    LABEL_FONT
        .get_or_init(|| match FontRef::try_from_slice(LABEL_FONT_DATA) {
            Ok(font) => Some(font),
            Err(e) => {
                tracing::warn!(error = %e, "Bundled label font failed to load");
                None
            }
        })
        .as_ref()
}

/// Paints into an RGBA buffer with source-over alpha blending.
///
/// Label text is rasterized with the bundled DejaVu Sans font, and
/// [`measure_text`](Surface::measure_text) uses the same metrics so label
/// backgrounds fit the text.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    image: RgbaImage,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width.max(1), height.max(1)),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), image::ImageError> {
        self.image
            .save_with_format(path.as_ref(), image::ImageFormat::Png)
    }

    /// Blend `color` over every pixel whose center lies inside `rect`.
    fn blend_rect(&mut self, rect: Rect, color: Color) {
        let (w, h) = self.image.dimensions();
        let Some((x0, x1)) = pixel_span(rect.x, rect.width, w) else {
            return;
        };
        let Some((y0, y1)) = pixel_span(rect.y, rect.height, h) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                let pixel = self.image.get_pixel_mut(x, y);
                *pixel = source_over(*pixel, color);
            }
        }
    }
}

impl Surface for RasterSurface {
    fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.image = RgbaImage::new(width.max(1), height.max(1));
    }

    fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f64) {
        // The stroke is centered on the outline; the four bands must not
        // overlap or the corners would be blended twice.
        let half = line_width / 2.0;
        let outer = Rect::new(
            rect.x - half,
            rect.y - half,
            rect.width + line_width,
            rect.height + line_width,
        );
        let side_height = (outer.height - 2.0 * line_width).max(0.0);

        self.blend_rect(Rect::new(outer.x, outer.y, outer.width, line_width), color);
        self.blend_rect(
            Rect::new(
                outer.x,
                outer.y + outer.height - line_width,
                outer.width,
                line_width,
            ),
            color,
        );
        self.blend_rect(
            Rect::new(outer.x, outer.y + line_width, line_width, side_height),
            color,
        );
        self.blend_rect(
            Rect::new(
                outer.x + outer.width - line_width,
                outer.y + line_width,
                line_width,
                side_height,
            ),
            color,
        );
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.blend_rect(rect, color);
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, color: Color) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        let Some(font) = label_font() else {
            return;
        };
        let (w, h) = self.image.dimensions();
        let (glyphs, _) = layout_line(font, text, x as f32, y as f32);

        for glyph in glyphs {
            // Whitespace has no outline.
            let Some(outlined) = font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            let image = &mut self.image;
            outlined.draw(|gx, gy, coverage| {
                let px = bounds.min.x as i64 + gx as i64;
                let py = bounds.min.y as i64 + gy as i64;
                if coverage <= 0.0 || px < 0 || py < 0 || px >= w as i64 || py >= h as i64 {
                    return;
                }
                let pixel = image.get_pixel_mut(px as u32, py as u32);
                let ink = Color {
                    alpha: color.alpha * coverage.min(1.0),
                    ..color
                };
                *pixel = source_over(*pixel, ink);
            });
        }
    }

    fn measure_text(&self, text: &str) -> f64 {
        match label_font() {
            Some(font) => layout_line(font, text, 0.0, 0.0).1 as f64,
            None => text.chars().count() as f64 * GLYPH_ADVANCE,
        }
    }
}

/// Scale that gives the font an em height of [`LABEL_FONT_PX`].
fn label_scale(font: &FontRef<'static>) -> PxScale {
    let height = font.height_unscaled();
    let em = font.units_per_em().unwrap_or(height);
    PxScale::from(LABEL_FONT_PX * height / em)
}

/// Position the glyphs of `text` on a baseline starting at (`x`, `y`).
/// Also returns the advance width of the whole line.
fn layout_line(font: &FontRef<'static>, text: &str, x: f32, y: f32) -> (Vec<Glyph>, f32) {
    let scaled = font.as_scaled(label_scale(font));
    let mut caret = 0.0_f32;
    let mut previous = None;
    let mut glyphs = Vec::with_capacity(text.len());

    for ch in text.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(prev) = previous {
            caret += scaled.kern(prev, id);
        }
        glyphs.push(id.with_scale_and_position(scaled.scale(), point(x + caret, y)));
        caret += scaled.h_advance(id);
        previous = Some(id);
    }
    (glyphs, caret)
}

/// Pixel indices `[start, end)` covered by the span `[origin, origin + len)`.
fn pixel_span(origin: f64, len: f64, limit: u32) -> Option<(u32, u32)> {
    if !origin.is_finite() || !len.is_finite() || len <= 0.0 {
        return None;
    }
    let start = origin.round().clamp(0.0, limit as f64) as u32;
    let end = (origin + len).round().clamp(0.0, limit as f64) as u32;
    (start < end).then_some((start, end))
}

fn source_over(dst: Rgba<u8>, color: Color) -> Rgba<u8> {
    let sa = color.alpha.clamp(0.0, 1.0);
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let channel = |s: u8, d: u8| -> u8 {
        let v = (s as f32 * sa + d as f32 * da * (1.0 - sa)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(color.r, dst[0]),
        channel(color.g, dst[1]),
        channel(color.b, dst[2]),
        (out_a * 255.0).round() as u8,
    ])
}
