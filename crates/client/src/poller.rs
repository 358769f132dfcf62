//! Job status poller.
//!
//! [`JobPoller`] tracks one server-side analysis job at a time. While the
//! job is in flight it fetches the job resource on a fixed cadence; each
//! tick runs in its own task and does not wait for the previous one.
//!
//! Responses can arrive out of order, so every fetch is tagged with the
//! cycle's [`Generation`] and a per-cycle sequence number. A response is
//! applied only while its generation is current, only if its sequence is
//! newer than the last applied one, and never after a terminal phase.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use laneguard_core::types::{JobState, JobStatus};
use laneguard_core::{Generation, Generations};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiClient, ApiError};
use crate::events::{ClientEvent, HandOff, EVENT_CHANNEL_CAPACITY};

/// Default cadence between job status requests.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(800);

/// Where job status comes from.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn fetch_job(&self, job_id: &str) -> Result<JobState, ApiError>;
}

#[async_trait]
impl JobSource for ApiClient {
    async fn fetch_job(&self, job_id: &str) -> Result<JobState, ApiError> {
        self.get_job(job_id).await
    }
}

/// Lifecycle of the watched job.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum PollerPhase {
    /// No job is being watched.
    #[default]
    Idle,
    /// Waiting for the job to finish. `job` is the last applied response.
    Polling {
        job_id: String,
        job: Option<JobState>,
    },
    Done {
        job_id: String,
        job: JobState,
        result_id: String,
    },
    /// The server reported the job as failed; `error` is its text verbatim.
    Failed {
        job_id: String,
        job: JobState,
        error: String,
    },
}

impl PollerPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollerPhase::Done { .. } | PollerPhase::Failed { .. })
    }

    pub fn job_id(&self) -> Option<&str> {
        match self {
            PollerPhase::Idle => None,
            PollerPhase::Polling { job_id, .. }
            | PollerPhase::Done { job_id, .. }
            | PollerPhase::Failed { job_id, .. } => Some(job_id),
        }
    }

    /// The last applied job snapshot.
    pub fn job(&self) -> Option<&JobState> {
        match self {
            PollerPhase::Idle => None,
            PollerPhase::Polling { job, .. } => job.as_ref(),
            PollerPhase::Done { job, .. } | PollerPhase::Failed { job, .. } => Some(job),
        }
    }

    pub fn hand_off(&self) -> Option<HandOff> {
        match self {
            PollerPhase::Done {
                job_id, result_id, ..
            } => Some(HandOff {
                job_id: job_id.clone(),
                result_id: result_id.clone(),
            }),
            _ => None,
        }
    }
}

/// Polls one job resource until it reaches a terminal status.
pub struct JobPoller {
    source: Arc<dyn JobSource>,
    interval: Duration,
    ctx: Arc<PollContext>,
    cycle: Option<CancellationToken>,
}

/// State shared between the poller and its tick and fetch tasks.
struct PollContext {
    generations: Generations,
    /// Sequence number of the last applied response in the current cycle.
    applied_seq: Mutex<u64>,
    phase_tx: watch::Sender<PollerPhase>,
    error_tx: watch::Sender<Option<String>>,
    event_tx: broadcast::Sender<ClientEvent>,
}

impl JobPoller {
    pub fn new(source: Arc<dyn JobSource>, interval: Duration) -> Self {
        let (phase_tx, _) = watch::channel(PollerPhase::Idle);
        let (error_tx, _) = watch::channel(None);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            source,
            interval,
            ctx: Arc::new(PollContext {
                generations: Generations::new(),
                applied_seq: Mutex::new(0),
                phase_tx,
                error_tx,
                event_tx,
            }),
            cycle: None,
        }
    }

    /// Start watching `job_id`, or go idle for `None`.
    ///
    /// The previous timer is cancelled and its in-flight requests are
    /// invalidated before the new cycle starts. Must be called from within
    /// a Tokio runtime.
    pub fn watch(&mut self, job_id: Option<String>) {
        self.stop();

        let generation = self.ctx.generations.advance();
        let Some(job_id) = job_id else {
            self.ctx.generations.apply(generation, || {
                self.ctx.reset(PollerPhase::Idle);
            });
            tracing::debug!("Job poller idle");
            return;
        };

        self.ctx.generations.apply(generation, || {
            self.ctx.reset(PollerPhase::Polling {
                job_id: job_id.clone(),
                job: None,
            });
        });

        let cancel = CancellationToken::new();
        tracing::info!(job_id = %job_id, interval_ms = self.interval.as_millis() as u64, "Polling job");
        tokio::spawn(run_cycle(
            Arc::clone(&self.source),
            job_id,
            Arc::clone(&self.ctx),
            generation,
            self.interval,
            cancel.clone(),
        ));
        self.cycle = Some(cancel);
    }

    /// Cancel the timer and invalidate in-flight requests. The phase is
    /// left as it is.
    pub fn stop(&mut self) {
        self.ctx.generations.invalidate();
        if let Some(cancel) = self.cycle.take() {
            cancel.cancel();
        }
    }

    pub fn phase(&self) -> PollerPhase {
        self.ctx.phase_tx.borrow().clone()
    }

    pub fn watch_phase(&self) -> watch::Receiver<PollerPhase> {
        self.ctx.phase_tx.subscribe()
    }

    /// The message of the last failed poll request, cleared by the next
    /// successful one.
    pub fn last_error(&self) -> Option<String> {
        self.ctx.error_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.ctx.event_tx.subscribe()
    }

    /// Wait until the watched job reaches `done` or `error`.
    pub async fn wait_terminal(&self) -> PollerPhase {
        let mut rx = self.watch_phase();
        let phase = match rx.wait_for(PollerPhase::is_terminal).await {
            Ok(phase) => phase.clone(),
            // The sender lives in `self`, so it cannot be gone here.
            Err(_) => self.phase(),
        };
        phase
    }
}

impl Drop for JobPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

impl PollContext {
    fn lock_seq(&self) -> MutexGuard<'_, u64> {
        self.applied_seq.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reset(&self, phase: PollerPhase) {
        *self.lock_seq() = 0;
        self.error_tx.send_replace(None);
        self.phase_tx.send_replace(phase);
    }

    /// Apply one fetch result. Must run inside `generations.apply`.
    fn apply_response(
        &self,
        job_id: &str,
        seq: u64,
        result: Result<JobState, ApiError>,
        cancel: &CancellationToken,
    ) {
        if self.phase_tx.borrow().is_terminal() {
            tracing::trace!(job_id, seq, "Ignoring response after terminal phase");
            return;
        }
        {
            let mut applied = self.lock_seq();
            if seq <= *applied {
                tracing::trace!(job_id, seq, applied = *applied, "Ignoring out-of-order response");
                return;
            }
            *applied = seq;
        }

        let job = match result {
            Ok(job) => job,
            Err(e) => {
                let error = e.to_string();
                tracing::warn!(job_id, error = %error, "Job status request failed");
                self.error_tx.send_replace(Some(error.clone()));
                let _ = self.event_tx.send(ClientEvent::JobPollFailed {
                    job_id: job_id.to_string(),
                    error,
                });
                return;
            }
        };

        self.error_tx.send_replace(None);

        match job.status {
            JobStatus::Queued | JobStatus::Processing => {
                self.publish_progress(job_id, job);
            }
            JobStatus::Done => {
                let Some(result_id) = job.result_id.clone().filter(|id| !id.is_empty()) else {
                    tracing::debug!(job_id, "Job done without result id; still polling");
                    self.publish_progress(job_id, job);
                    return;
                };
                tracing::info!(job_id, result_id = %result_id, "Job finished");
                cancel.cancel();
                let hand_off = HandOff {
                    job_id: job_id.to_string(),
                    result_id: result_id.clone(),
                };
                self.phase_tx.send_replace(PollerPhase::Done {
                    job_id: job_id.to_string(),
                    job,
                    result_id,
                });
                let _ = self.event_tx.send(ClientEvent::JobCompleted(hand_off));
            }
            JobStatus::Error => {
                let error = job
                    .error
                    .clone()
                    .or_else(|| job.message.clone())
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| "Job failed".to_string());
                tracing::warn!(job_id, error = %error, "Job failed on server");
                cancel.cancel();
                self.phase_tx.send_replace(PollerPhase::Failed {
                    job_id: job_id.to_string(),
                    job,
                    error: error.clone(),
                });
                let _ = self.event_tx.send(ClientEvent::JobFailed {
                    job_id: job_id.to_string(),
                    error,
                });
            }
        }
    }

    fn publish_progress(&self, job_id: &str, job: JobState) {
        let _ = self.event_tx.send(ClientEvent::JobProgress {
            job_id: job_id.to_string(),
            status: job.status,
            percent: job.progress_percent(),
        });
        self.phase_tx.send_replace(PollerPhase::Polling {
            job_id: job_id.to_string(),
            job: Some(job),
        });
    }
}

/// Tick loop for one watched job. Each tick spawns an independent fetch.
async fn run_cycle(
    source: Arc<dyn JobSource>,
    job_id: String,
    ctx: Arc<PollContext>,
    generation: Generation,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut seq: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                seq += 1;
                tokio::spawn(fetch_once(
                    Arc::clone(&source),
                    job_id.clone(),
                    Arc::clone(&ctx),
                    generation,
                    seq,
                    cancel.clone(),
                ));
            }
        }
    }

    tracing::debug!(job_id = %job_id, ticks = seq, "Job poll cycle stopped");
}

async fn fetch_once(
    source: Arc<dyn JobSource>,
    job_id: String,
    ctx: Arc<PollContext>,
    generation: Generation,
    seq: u64,
    cancel: CancellationToken,
) {
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = source.fetch_job(&job_id) => result,
    };
    ctx.generations.apply(generation, || {
        ctx.apply_response(&job_id, seq, result, &cancel);
    });
}
