//! Command-line interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use laneguard_core::params::{
    AnalyzeParams, LaneRoi, StreamParams, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_DANGER_Y_RATIO,
    DEFAULT_SAMPLE_STRIDE, DEFAULT_WARNING_Y_RATIO,
};

#[derive(Parser, Debug)]
#[command(
    name = "laneguard",
    version,
    about = "Terminal front-end for the LaneGuard obstacle detection service"
)]
pub struct Cli {
    /// HTTP base URL of the detection service (overrides LANEGUARD_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Follow the realtime detection stream and render its overlay
    Live(LiveArgs),
    /// Upload a video for analysis, wait for it, then show the results
    Submit(SubmitArgs),
    /// Watch an existing analysis job until it finishes
    Job {
        job_id: String,
    },
    /// Show the event timeline of a finished analysis
    Results(ResultsArgs),
    /// Check that the service is up
    Health,
}

/// Detection thresholds shared by the live stream and uploaded videos.
#[derive(Args, Debug, Clone)]
pub struct DetectionArgs {
    /// Analyze one frame out of every N
    #[arg(long, default_value_t = DEFAULT_SAMPLE_STRIDE)]
    pub stride: u32,

    /// Minimum detector confidence (0-1)
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
    pub confidence: f64,

    /// Bottom-edge ratio at which a detection becomes a warning
    #[arg(long, default_value_t = DEFAULT_WARNING_Y_RATIO)]
    pub warning_y: f64,

    /// Bottom-edge ratio at which a detection becomes a danger
    #[arg(long, default_value_t = DEFAULT_DANGER_Y_RATIO)]
    pub danger_y: f64,
}

#[derive(Args, Debug, Clone)]
pub struct LiveArgs {
    /// Camera index opened by the service
    #[arg(long, default_value_t = 0)]
    pub src: u32,

    #[command(flatten)]
    pub detection: DetectionArgs,

    /// Width of the overlay surface, in pixels
    #[arg(long, default_value_t = 1280.0)]
    pub width: f64,

    /// Height of the overlay surface, in pixels
    #[arg(long, default_value_t = 720.0)]
    pub height: f64,

    /// Write the overlay to this PNG after every frame
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Stop after this many frames
    #[arg(long, value_name = "N")]
    pub frames: Option<u64>,
}

impl LiveArgs {
    pub fn stream_params(&self) -> StreamParams {
        StreamParams {
            source_index: self.src,
            sample_stride: self.detection.stride,
            confidence_threshold: self.detection.confidence,
            warning_y_ratio: self.detection.warning_y,
            danger_y_ratio: self.detection.danger_y,
        }
    }
}

/// Lane-of-interest trapezoid for uploaded videos.
#[derive(Args, Debug, Clone)]
pub struct LaneArgs {
    /// Keep detections outside the lane trapezoid
    #[arg(long)]
    pub no_lane: bool,

    #[arg(long, default_value_t = 0.5)]
    pub lane_center_x: f64,

    #[arg(long, default_value_t = 0.55)]
    pub lane_top_y: f64,

    #[arg(long, default_value_t = 0.98)]
    pub lane_bottom_y: f64,

    #[arg(long, default_value_t = 0.25)]
    pub lane_top_width: f64,

    #[arg(long, default_value_t = 0.9)]
    pub lane_bottom_width: f64,
}

impl LaneArgs {
    pub fn lane_roi(&self) -> LaneRoi {
        LaneRoi {
            enabled: !self.no_lane,
            center_x_ratio: self.lane_center_x,
            top_y_ratio: self.lane_top_y,
            bottom_y_ratio: self.lane_bottom_y,
            top_width_ratio: self.lane_top_width,
            bottom_width_ratio: self.lane_bottom_width,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SubmitArgs {
    /// Video file to analyze
    pub file: PathBuf,

    #[command(flatten)]
    pub detection: DetectionArgs,

    #[command(flatten)]
    pub lane: LaneArgs,

    /// Print the job id and exit instead of waiting
    #[arg(long)]
    pub no_wait: bool,
}

impl SubmitArgs {
    pub fn analyze_params(&self) -> AnalyzeParams {
        AnalyzeParams {
            sample_stride: self.detection.stride,
            confidence_threshold: self.detection.confidence,
            warning_y_ratio: self.detection.warning_y,
            danger_y_ratio: self.detection.danger_y,
            lane: self.lane.lane_roi(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ResultsArgs {
    pub result_id: String,

    /// Move playback to the event with this index
    #[arg(long, value_name = "INDEX")]
    pub seek_event: Option<usize>,

    /// Save the annotated video here
    #[arg(long, value_name = "PATH")]
    pub video: Option<PathBuf>,

    /// Save every event snapshot into this directory
    #[arg(long, value_name = "DIR")]
    pub snapshots: Option<PathBuf>,
}
