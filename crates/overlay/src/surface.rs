//! Drawing surface abstraction.
//!
//! The renderer only needs a handful of 2D primitives. Hosts implement
//! [`Surface`] over whatever they actually paint on.

use laneguard_core::geometry::Rect;
use laneguard_core::risk::Color;

/// Per-glyph advance assumed by surfaces without font metrics.
pub const GLYPH_ADVANCE: f64 = 7.0;

/// A transparent 2D canvas sized in device pixels.
pub trait Surface {
    fn size(&self) -> (u32, u32);

    /// Change the pixel size. Content is discarded.
    fn resize(&mut self, width: u32, height: u32);

    /// Make every pixel fully transparent.
    fn clear(&mut self);

    /// Outline `rect` with a stroke of `line_width` pixels.
    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f64);

    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Draw `text` with its baseline starting at (`x`, `y`).
    fn fill_text(&mut self, text: &str, x: f64, y: f64, color: Color);

    /// Width of `text` in pixels when drawn with [`fill_text`](Self::fill_text).
    fn measure_text(&self, text: &str) -> f64 {
        text.chars().count() as f64 * GLYPH_ADVANCE
    }
}

/// One recorded drawing call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    StrokeRect {
        rect: Rect,
        color: Color,
        line_width: f64,
    },
    FillRect {
        rect: Rect,
        color: Color,
    },
    FillText {
        text: String,
        x: f64,
        y: f64,
        color: Color,
    },
}

/// Surface that keeps the draw operations issued since the last clear.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    ops: Vec<DrawOp>,
    clears: usize,
    resizes: usize,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
            clears: 0,
            resizes: 0,
        }
    }

    /// Operations drawn since the last clear.
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn clear_count(&self) -> usize {
        self.clears
    }

    pub fn resize_count(&self) -> usize {
        self.resizes
    }
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.ops.clear();
        self.resizes += 1;
    }

    fn clear(&mut self) {
        self.ops.clear();
        self.clears += 1;
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f64) {
        self.ops.push(DrawOp::StrokeRect {
            rect,
            color,
            line_width,
        });
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.ops.push(DrawOp::FillRect { rect, color });
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, color: Color) {
        self.ops.push(DrawOp::FillText {
            text: text.to_string(),
            x,
            y,
            color,
        });
    }
}
