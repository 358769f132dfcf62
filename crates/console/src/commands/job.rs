//! `laneguard job`: follow a job until it finishes.

use std::sync::Arc;

use laneguard_client::events::{ClientEvent, HandOff};
use laneguard_client::poller::JobPoller;
use laneguard_core::types::JobState;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::Context;

pub async fn run(ctx: &Context, job_id: String) -> anyhow::Result<()> {
    let cancel = super::interrupt_token();
    if let Some(hand_off) = follow(ctx, job_id, &cancel).await? {
        println!("Result: {}", hand_off.result_id);
        println!("Run `laneguard results {}` to inspect it.", hand_off.result_id);
    }
    Ok(())
}

/// Poll `job_id` until it completes. Returns `None` when interrupted.
pub async fn follow(
    ctx: &Context,
    job_id: String,
    cancel: &CancellationToken,
) -> anyhow::Result<Option<HandOff>> {
    let mut poller = JobPoller::new(Arc::new(ctx.api.clone()), ctx.config.poll_interval);
    let mut events = poller.subscribe();
    poller.watch(Some(job_id.clone()));

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => {
                poller.stop();
                return Ok(None);
            }
            event = events.recv() => event,
        };

        match event {
            Ok(ClientEvent::JobProgress { .. }) => {
                if let Some(job) = poller.phase().job() {
                    println!("{}", format_progress(job));
                }
            }
            Ok(ClientEvent::JobPollFailed { error, .. }) => {
                eprintln!("warning: {error} (retrying)");
            }
            Ok(ClientEvent::JobCompleted(hand_off)) => {
                println!("done 100%");
                return Ok(Some(hand_off));
            }
            Ok(ClientEvent::JobFailed { error, .. }) => {
                anyhow::bail!("Job {job_id} failed: {error}");
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Progress output lagged");
            }
            Err(RecvError::Closed) => {
                anyhow::bail!("Job poller stopped unexpectedly");
            }
        }
    }
}

/// `"processing  43%  213/500 frames  Analyzing"`.
pub fn format_progress(job: &JobState) -> String {
    let mut line = format!("{:<10} {:>3}%", job.status.as_str(), job.progress_percent());
    if let Some(frames) = job.frames_label() {
        line.push_str("  ");
        line.push_str(&frames);
    }
    if let Some(message) = job.message.as_deref().filter(|m| !m.is_empty()) {
        line.push_str("  ");
        line.push_str(message);
    }
    line
}
