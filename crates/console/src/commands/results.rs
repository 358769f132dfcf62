//! `laneguard results`: show a finished analysis.

use std::sync::Arc;

use anyhow::Context as _;
use laneguard_client::api::ApiClient;
use laneguard_client::timeline::{LoadedTimeline, TimelineSync, VideoElement};
use laneguard_core::geometry::confidence_percent;
use laneguard_core::types::{format_timestamp, TimelineEvent};

use super::Context;
use crate::cli::ResultsArgs;

pub async fn run(ctx: &Context, args: ResultsArgs) -> anyhow::Result<()> {
    let sync = TimelineSync::new(Arc::new(ctx.api.clone()));
    let loaded = sync.load(&args.result_id).await?;

    print_timeline(&loaded);

    if let Some(index) = args.seek_event {
        sync.bind_video(Box::new(TerminalPlayer {
            video_url: ctx.api.video_url(&loaded.result_id),
        }));
        if !sync.seek_event(index) {
            anyhow::bail!(
                "No event at index {index} (timeline has {} events)",
                loaded.events.len()
            );
        }
    }

    if let Some(path) = &args.video {
        let bytes = ctx.api.download_video(&loaded.result_id).await?;
        tokio::fs::write(path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Saved annotated video to {} ({} bytes)", path.display(), bytes.len());
    }

    if let Some(dir) = &args.snapshots {
        let saved = save_snapshots(&ctx.api, &loaded, dir).await?;
        println!("Saved {saved} snapshots to {}", dir.display());
    }

    Ok(())
}

pub fn print_timeline(loaded: &LoadedTimeline) {
    let meta = &loaded.meta;
    println!("Result   {}", loaded.result_id);
    println!("File     {}", meta.filename);
    println!("Mode     {}", meta.detection_mode);
    if let Some(frames) = meta.frame_count {
        println!("Frames   {frames}");
    }
    if let Some(fps) = meta.fps {
        println!("FPS      {fps:.1}");
    }
    println!("Took     {:.1}s", meta.processing_time_s);
    println!(
        "Events   {} (warning {}, danger {})",
        loaded.events.len(),
        loaded.summary.warning,
        loaded.summary.danger
    );

    if loaded.events.is_empty() {
        return;
    }
    println!();
    for (index, event) in loaded.events.iter().enumerate() {
        println!("{}", format_event_row(index, event));
    }
}

/// `"   1  00:03  DANGER   person       93%  f90.jpg"`.
pub fn format_event_row(index: usize, event: &TimelineEvent) -> String {
    let row = format!(
        "{:>4}  {}  {:<7}  {:<10} {:>4}%",
        index,
        format_timestamp(event.timestamp_ms),
        event.risk_level.label(),
        event.class_name.as_deref().unwrap_or("-"),
        confidence_percent(event.confidence),
    );
    match &event.snapshot {
        Some(snapshot) => format!("{row}  {snapshot}"),
        None => row,
    }
}

async fn save_snapshots(
    api: &ApiClient,
    loaded: &LoadedTimeline,
    dir: &std::path::Path,
) -> anyhow::Result<usize> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut saved = 0;
    for name in loaded.events.iter().filter_map(|e| e.snapshot.as_deref()) {
        let bytes = match api.download_snapshot(&loaded.result_id, name).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(snapshot = name, error = %e, "Skipping snapshot");
                continue;
            }
        };
        let path = dir.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        saved += 1;
    }
    Ok(saved)
}

/// Stand-in playback element that reports seeks on stdout.
struct TerminalPlayer {
    video_url: String,
}

impl VideoElement for TerminalPlayer {
    fn set_current_time(&mut self, seconds: f64) {
        println!("Seek {} to {seconds:.3}s", self.video_url);
    }

    fn play(&mut self) {
        println!("Playing");
    }
}

#[cfg(test)]
mod tests {
    use laneguard_core::RiskLevel;

    use super::*;

    fn event(timestamp_ms: i64, snapshot: Option<&str>) -> TimelineEvent {
        TimelineEvent {
            frame_index: 90,
            timestamp_ms,
            risk_level: RiskLevel::Danger,
            class_name: Some("person".into()),
            confidence: 0.934,
            snapshot: snapshot.map(String::from),
        }
    }

    #[test]
    fn event_row_with_snapshot() {
        assert_eq!(
            format_event_row(1, &event(3600, Some("f90.jpg"))),
            "   1  00:03  DANGER   person       93%  f90.jpg"
        );
    }

    #[test]
    fn event_row_without_class_or_snapshot() {
        let mut e = event(61_999, None);
        e.class_name = None;
        e.risk_level = RiskLevel::Warning;
        assert_eq!(
            format_event_row(12, &e),
            "  12  01:01  WARNING  -            93%"
        );
    }
}
