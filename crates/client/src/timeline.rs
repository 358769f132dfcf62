//! Results timeline synchronizer.
//!
//! Loads the metadata and event timeline of a finished result, derives
//! the warning/danger [`Summary`], and turns a selected event into a
//! playback-position command on a bound [`VideoElement`].

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use laneguard_core::types::{ResultMeta, Summary, TimelineEvent};
use laneguard_core::Generations;
use tokio::sync::watch;

use crate::api::{ApiClient, ApiError};

/// Where result data comes from.
#[async_trait]
pub trait ResultSource: Send + Sync {
    async fn fetch_meta(&self, result_id: &str) -> Result<ResultMeta, ApiError>;
    async fn fetch_events(&self, result_id: &str) -> Result<Vec<TimelineEvent>, ApiError>;
}

#[async_trait]
impl ResultSource for ApiClient {
    async fn fetch_meta(&self, result_id: &str) -> Result<ResultMeta, ApiError> {
        self.get_result_meta(result_id).await
    }

    async fn fetch_events(&self, result_id: &str) -> Result<Vec<TimelineEvent>, ApiError> {
        self.get_result_events(result_id).await
    }
}

/// The playback element the timeline drives.
pub trait VideoElement: Send {
    /// Move the playhead, in seconds.
    fn set_current_time(&mut self, seconds: f64);
    fn play(&mut self);
}

/// Everything known about one loaded result. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTimeline {
    pub result_id: String,
    pub meta: ResultMeta,
    /// In server order.
    pub events: Vec<TimelineEvent>,
    pub summary: Summary,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum TimelineState {
    #[default]
    Idle,
    Loading {
        result_id: String,
    },
    Loaded(Arc<LoadedTimeline>),
    Failed {
        result_id: String,
        error: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    /// Either the metadata or the event list could not be fetched.
    #[error("Failed to load result: {0}")]
    Load(#[from] ApiError),

    /// A newer `load` or `clear` replaced this one before it finished.
    #[error("Load was superseded")]
    Superseded,
}

pub struct TimelineSync {
    source: Arc<dyn ResultSource>,
    generations: Generations,
    state_tx: watch::Sender<TimelineState>,
    video: Mutex<Option<Box<dyn VideoElement>>>,
}

impl TimelineSync {
    pub fn new(source: Arc<dyn ResultSource>) -> Self {
        let (state_tx, _) = watch::channel(TimelineState::Idle);
        Self {
            source,
            generations: Generations::new(),
            state_tx,
            video: Mutex::new(None),
        }
    }

    /// Fetch metadata and events for `result_id` concurrently.
    ///
    /// Fails as a whole on the first error; no partial state is kept.
    pub async fn load(&self, result_id: &str) -> Result<Arc<LoadedTimeline>, TimelineError> {
        let generation = self.generations.advance();
        self.generations.apply(generation, || {
            self.state_tx.send_replace(TimelineState::Loading {
                result_id: result_id.to_string(),
            });
        });

        let fetched = tokio::try_join!(
            self.source.fetch_meta(result_id),
            self.source.fetch_events(result_id),
        );

        match fetched {
            Ok((meta, events)) => {
                let summary = Summary::from_events(&events);
                let loaded = Arc::new(LoadedTimeline {
                    result_id: result_id.to_string(),
                    meta,
                    events,
                    summary,
                });
                tracing::info!(
                    result_id,
                    events = loaded.events.len(),
                    warning = summary.warning,
                    danger = summary.danger,
                    "Result timeline loaded",
                );
                self.generations
                    .apply(generation, || {
                        self.state_tx
                            .send_replace(TimelineState::Loaded(Arc::clone(&loaded)));
                    })
                    .map(|_| loaded)
                    .ok_or(TimelineError::Superseded)
            }
            Err(e) => {
                tracing::warn!(result_id, error = %e, "Failed to load result timeline");
                let error = TimelineError::Load(e);
                let message = error.to_string();
                match self.generations.apply(generation, || {
                    self.state_tx.send_replace(TimelineState::Failed {
                        result_id: result_id.to_string(),
                        error: message,
                    });
                }) {
                    Some(()) => Err(error),
                    None => Err(TimelineError::Superseded),
                }
            }
        }
    }

    /// Drop the loaded timeline and invalidate any in-flight load.
    pub fn clear(&self) {
        let generation = self.generations.advance();
        self.generations.apply(generation, || {
            self.state_tx.send_replace(TimelineState::Idle);
        });
    }

    pub fn bind_video(&self, video: Box<dyn VideoElement>) {
        *self.lock_video() = Some(video);
    }

    pub fn unbind_video(&self) -> Option<Box<dyn VideoElement>> {
        self.lock_video().take()
    }

    pub fn state(&self) -> TimelineState {
        self.state_tx.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<TimelineState> {
        self.state_tx.subscribe()
    }

    /// The loaded timeline, if any.
    pub fn current(&self) -> Option<Arc<LoadedTimeline>> {
        match &*self.state_tx.borrow() {
            TimelineState::Loaded(loaded) => Some(Arc::clone(loaded)),
            _ => None,
        }
    }

    /// Move the bound video to `timestamp_ms` and resume playback.
    ///
    /// Negative offsets clamp to zero. Returns `false` (and does nothing)
    /// when no video is bound or no timeline is loaded.
    pub fn seek(&self, timestamp_ms: i64) -> bool {
        if self.current().is_none() {
            return false;
        }
        let mut video = self.lock_video();
        let Some(video) = video.as_mut() else {
            return false;
        };
        let seconds = timestamp_ms.max(0) as f64 / 1000.0;
        video.set_current_time(seconds);
        video.play();
        tracing::debug!(timestamp_ms, seconds, "Seeked result video");
        true
    }

    /// Seek to the event at `index` in the loaded timeline.
    pub fn seek_event(&self, index: usize) -> bool {
        let Some(timestamp_ms) = self
            .current()
            .and_then(|t| t.events.get(index).map(|e| e.timestamp_ms))
        else {
            return false;
        };
        self.seek(timestamp_ms)
    }

    fn lock_video(&self) -> MutexGuard<'_, Option<Box<dyn VideoElement>>> {
        self.video.lock().unwrap_or_else(|e| e.into_inner())
    }
}
