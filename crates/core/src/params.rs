//! Detection parameter sets sent to the service.
//!
//! Validation only enforces what the input widgets would: non-negative
//! values, ratios at most 1, a stride of at least 1. Cross-field
//! consistency (e.g. a danger ratio above the warning ratio) is left to
//! the server.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;

pub const DEFAULT_SAMPLE_STRIDE: u32 = 1;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;
pub const DEFAULT_WARNING_Y_RATIO: f64 = 0.65;
pub const DEFAULT_DANGER_Y_RATIO: f64 = 0.80;

/// Parameters of a live detection stream. Any change to this set opens a
/// fresh connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct StreamParams {
    /// Camera index the server opens.
    pub source_index: u32,
    /// Analyze one frame out of every N.
    #[validate(range(min = 1))]
    pub sample_stride: u32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence_threshold: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub warning_y_ratio: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub danger_y_ratio: f64,
}

impl Default for StreamParams {
    fn default() -> Self {
        Self {
            source_index: 0,
            sample_stride: DEFAULT_SAMPLE_STRIDE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            warning_y_ratio: DEFAULT_WARNING_Y_RATIO,
            danger_y_ratio: DEFAULT_DANGER_Y_RATIO,
        }
    }
}

impl StreamParams {
    pub fn validated(self) -> Result<Self, CoreError> {
        self.validate()?;
        Ok(self)
    }

    /// Query parameters in the order the realtime endpoints expect them.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("src", self.source_index.to_string()),
            ("sampled_every_n_frames", self.sample_stride.to_string()),
            ("confidence_threshold", self.confidence_threshold.to_string()),
            ("roi_warning_y_ratio", self.warning_y_ratio.to_string()),
            ("roi_danger_y_ratio", self.danger_y_ratio.to_string()),
        ]
    }
}

/// Trapezoid in front of the vehicle; detections outside it are dropped
/// server-side. All values are fractions of the frame size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct LaneRoi {
    pub enabled: bool,
    #[validate(range(min = 0.0, max = 1.0))]
    pub center_x_ratio: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub top_y_ratio: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub bottom_y_ratio: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub top_width_ratio: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub bottom_width_ratio: f64,
}

impl Default for LaneRoi {
    fn default() -> Self {
        Self {
            enabled: true,
            center_x_ratio: 0.5,
            top_y_ratio: 0.55,
            bottom_y_ratio: 0.98,
            top_width_ratio: 0.25,
            bottom_width_ratio: 0.9,
        }
    }
}

/// Parameters of an uploaded-video analysis job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AnalyzeParams {
    #[validate(range(min = 1))]
    pub sample_stride: u32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence_threshold: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub warning_y_ratio: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub danger_y_ratio: f64,
    #[validate(nested)]
    pub lane: LaneRoi,
}

impl Default for AnalyzeParams {
    fn default() -> Self {
        Self {
            sample_stride: DEFAULT_SAMPLE_STRIDE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            warning_y_ratio: DEFAULT_WARNING_Y_RATIO,
            danger_y_ratio: DEFAULT_DANGER_Y_RATIO,
            lane: LaneRoi::default(),
        }
    }
}

impl AnalyzeParams {
    pub fn validated(self) -> Result<Self, CoreError> {
        self.validate()?;
        Ok(self)
    }

    /// Multipart text fields accompanying the uploaded video.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("sampled_every_n_frames", self.sample_stride.to_string()),
            ("confidence_threshold", self.confidence_threshold.to_string()),
            ("roi_warning_y_ratio", self.warning_y_ratio.to_string()),
            ("roi_danger_y_ratio", self.danger_y_ratio.to_string()),
            ("lane_roi_enabled", self.lane.enabled.to_string()),
            ("lane_roi_center_x_ratio", self.lane.center_x_ratio.to_string()),
            ("lane_roi_top_y_ratio", self.lane.top_y_ratio.to_string()),
            ("lane_roi_bottom_y_ratio", self.lane.bottom_y_ratio.to_string()),
            ("lane_roi_top_width_ratio", self.lane.top_width_ratio.to_string()),
            (
                "lane_roi_bottom_width_ratio",
                self.lane.bottom_width_ratio.to_string(),
            ),
        ]
    }
}
