//! Frame-to-surface coordinate mapping for the detection overlay.
//!
//! The overlay surface is sized to the on-screen rectangle of the live
//! image, which rarely matches the analyzed frame's resolution or aspect
//! ratio. Boxes are therefore scaled independently on each axis.

use crate::types::{BoundingBox, Detection};

/// Height of one label line, in surface pixels.
pub const LABEL_HEIGHT: f64 = 18.0;
/// Total horizontal padding added around the measured label text.
pub const LABEL_PADDING: f64 = 8.0;
/// Left inset of the label text inside its background.
pub const LABEL_TEXT_INSET: f64 = 4.0;
/// Distance from the box's top edge up to the text baseline.
pub const LABEL_BASELINE_OFFSET: f64 = 5.0;
/// Lowest allowed baseline, so the text stays inside the surface.
pub const LABEL_MIN_BASELINE: f64 = 14.0;
/// Stroke width of box outlines.
pub const BOX_LINE_WIDTH: f64 = 2.0;
/// Shown when the detector did not name the object class.
pub const DEFAULT_CLASS_LABEL: &str = "obj";

/// A rectangle in surface pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// On-screen size of the live image, in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DisplayRect {
    pub width: f64,
    pub height: f64,
}

impl DisplayRect {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Surface dimensions matching this display rectangle: floored, and
    /// never smaller than one pixel on either axis.
    pub fn surface_size(&self) -> (u32, u32) {
        (whole_pixels(self.width), whole_pixels(self.height))
    }
}

fn whole_pixels(v: f64) -> u32 {
    if v.is_finite() && v >= 1.0 {
        v.floor().min(u32::MAX as f64) as u32
    } else {
        1
    }
}

/// Per-axis scale from frame coordinates to surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub sx: f64,
    pub sy: f64,
}

impl Scale {
    /// Returns `None` when the frame has a zero dimension.
    pub fn between(surface: (u32, u32), frame: (u32, u32)) -> Option<Self> {
        if frame.0 == 0 || frame.1 == 0 {
            return None;
        }
        Some(Self {
            sx: surface.0 as f64 / frame.0 as f64,
            sy: surface.1 as f64 / frame.1 as f64,
        })
    }

    pub fn map(&self, bbox: &BoundingBox) -> Rect {
        Rect {
            x: bbox.x * self.sx,
            y: bbox.y * self.sy,
            width: bbox.width * self.sx,
            height: bbox.height * self.sy,
        }
    }
}

/// Where a box label and its background go.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelPlacement {
    pub background: Rect,
    pub text_x: f64,
    pub text_y: f64,
}

/// Place a label directly above `rect`, clamped to the top of the surface.
pub fn place_label(rect: &Rect, text_width: f64) -> LabelPlacement {
    LabelPlacement {
        background: Rect {
            x: rect.x,
            y: (rect.y - LABEL_HEIGHT).max(0.0),
            width: text_width + LABEL_PADDING,
            height: LABEL_HEIGHT,
        },
        text_x: rect.x + LABEL_TEXT_INSET,
        text_y: (rect.y - LABEL_BASELINE_OFFSET).max(LABEL_MIN_BASELINE),
    }
}

/// `"DANGER | person 87%"`.
///
/// Unrecognized risk values are shown upper-cased as sent, while still
/// being styled as [`RiskLevel::Info`](crate::risk::RiskLevel::Info).
pub fn label_text(detection: &Detection) -> String {
    let risk = detection
        .risk_name
        .as_deref()
        .map(str::to_uppercase)
        .unwrap_or_else(|| detection.risk_level.label().to_string());
    let class = detection
        .class_name
        .as_deref()
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CLASS_LABEL);
    format!(
        "{} | {} {}%",
        risk,
        class,
        confidence_percent(detection.confidence)
    )
}

/// Confidence rounded to the nearest whole percent.
pub fn confidence_percent(confidence: f64) -> i64 {
    if confidence.is_finite() {
        (confidence * 100.0).round() as i64
    } else {
        0
    }
}
