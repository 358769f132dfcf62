//! Wire data model shared by the stream, job and result endpoints.
//!
//! Decoding is deliberately forgiving about optional fields (nulls and
//! missing keys fall back to defaults) because the detector emits sparse
//! payloads. Structural problems still fail to decode.

use serde::{Deserialize, Deserializer, Serialize};

use crate::risk::RiskLevel;

/// Treat an explicit JSON `null` the same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Live stream
// ---------------------------------------------------------------------------

/// Axis-aligned box in the coordinate space of the analyzed frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    #[serde(rename = "w")]
    pub width: f64,
    #[serde(rename = "h")]
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A single object found by the remote detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireDetection")]
pub struct Detection {
    pub bbox: BoundingBox,
    pub risk_level: RiskLevel,
    /// Risk value exactly as sent, kept for labelling values the client
    /// does not recognize.
    #[serde(skip)]
    pub risk_name: Option<String>,
    pub class_name: Option<String>,
    pub class_id: Option<i64>,
    /// Detector confidence in `0.0..=1.0`.
    pub confidence: f64,
    /// Server-side explanation of the risk classification, if any.
    pub reason: Option<String>,
}

/// Detections arrive either with a nested `bbox` object or with the box
/// components flattened onto the detection itself.
#[derive(Deserialize)]
struct WireDetection {
    #[serde(default)]
    bbox: Option<WireBox>,
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    y: Option<f64>,
    #[serde(default)]
    w: Option<f64>,
    #[serde(default)]
    h: Option<f64>,
    #[serde(default)]
    risk_level: Option<String>,
    #[serde(default)]
    class_name: Option<String>,
    #[serde(default)]
    class_id: Option<i64>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireBox {
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    y: Option<f64>,
    #[serde(default)]
    w: Option<f64>,
    #[serde(default)]
    h: Option<f64>,
}

impl From<WireDetection> for Detection {
    fn from(wire: WireDetection) -> Self {
        let nested = wire.bbox.unwrap_or_default();
        let pick = |inner: Option<f64>, flat: Option<f64>| inner.or(flat).unwrap_or(0.0);
        Self {
            bbox: BoundingBox {
                x: pick(nested.x, wire.x),
                y: pick(nested.y, wire.y),
                width: pick(nested.w, wire.w),
                height: pick(nested.h, wire.h),
            },
            risk_level: RiskLevel::from_wire(wire.risk_level.as_deref()),
            risk_name: wire.risk_level.filter(|r| !r.is_empty()),
            class_name: wire.class_name,
            class_id: wire.class_id,
            confidence: wire.confidence.unwrap_or(0.0),
            reason: wire.reason,
        }
    }
}

/// One analyzed frame pushed over the realtime stream.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamMessage {
    #[serde(default)]
    pub frame_id: Option<i64>,
    #[serde(default)]
    pub frame_width: Option<u32>,
    #[serde(default)]
    pub frame_height: Option<u32>,
    #[serde(default)]
    pub detection_mode: Option<String>,
    /// Smoothed inference rate reported by the server.
    #[serde(default, rename = "fps")]
    pub inference_fps: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub detections: Vec<Detection>,
}

impl StreamMessage {
    /// Reference frame size, or `None` when either dimension is missing
    /// or zero.
    pub fn frame_size(&self) -> Option<(u32, u32)> {
        match (self.frame_width, self.frame_height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }

    /// Highest risk level present in this frame, if it has detections.
    pub fn max_risk(&self) -> Option<RiskLevel> {
        self.detections.iter().map(|d| d.risk_level).max()
    }
}

/// Transport-driven state of a live stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Server-reported job status. `running` is accepted as `processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    #[serde(alias = "running")]
    Processing,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }
}

/// Snapshot of a server-side video job, as returned by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    #[serde(default)]
    pub job_id: Option<String>,
    pub status: JobStatus,
    /// Completion fraction in `0.0..=1.0`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub progress: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub processed_frames: u64,
    #[serde(default)]
    pub total_frames: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
    /// Server error text, present when `status` is `error`.
    #[serde(default)]
    pub error: Option<String>,
    /// Result identifier, present when `status` is `done`.
    #[serde(default)]
    pub result_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<f64>,
    #[serde(default)]
    pub updated_at: Option<f64>,
}

impl JobState {
    /// Progress rounded to a whole percent, clamped to `0..=100`.
    pub fn progress_percent(&self) -> u8 {
        (self.progress.clamp(0.0, 1.0) * 100.0).round() as u8
    }

    /// `"processed/total frames"`, only when the total is known.
    pub fn frames_label(&self) -> Option<String> {
        match self.total_frames {
            Some(total) if total > 0 => {
                Some(format!("{}/{} frames", self.processed_frames, total))
            }
            _ => None,
        }
    }
}

/// Response of the job submission endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobAccepted {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub status: Option<JobStatus>,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Metadata of a completed analysis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultMeta {
    #[serde(default)]
    pub result_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub filename: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub detection_mode: String,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub frame_count: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub processing_time_s: f64,
    #[serde(default)]
    pub created_at: Option<f64>,
    /// Analysis configuration echoed back by the server; opaque here.
    #[serde(default)]
    pub config: Option<serde_json::Value>,
}

/// A warning/danger moment recorded while analyzing an uploaded video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub frame_index: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp_ms: i64,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub confidence: f64,
    /// File name of the snapshot image, served under the result.
    #[serde(default)]
    pub snapshot: Option<String>,
}

/// Body of the result events endpoint.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct EventList {
    #[serde(default)]
    pub result_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub events: Vec<TimelineEvent>,
}

/// Counts of counted risk levels over an event timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Summary {
    pub warning: usize,
    pub danger: usize,
}

impl Summary {
    /// Single pass over the timeline; `info` events are not counted.
    pub fn from_events(events: &[TimelineEvent]) -> Self {
        let mut summary = Summary::default();
        for event in events {
            match event.risk_level {
                RiskLevel::Warning => summary.warning += 1,
                RiskLevel::Danger => summary.danger += 1,
                RiskLevel::Info => {}
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.warning + self.danger
    }
}

/// Format a playback offset as `mm:ss`, flooring to whole seconds.
/// Negative offsets render as `00:00`.
pub fn format_timestamp(timestamp_ms: i64) -> String {
    let secs = timestamp_ms.max(0) / 1000;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
