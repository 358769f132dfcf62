//! Client-level events.
//!
//! These events represent high-level state changes a front-end cares
//! about. They are produced by the stream manager and the job poller
//! after interpreting raw transport and HTTP traffic.

use laneguard_core::types::{ConnectionState, JobStatus};
use serde::Serialize;

/// Broadcast channel capacity for client events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// One-time transfer from a finished job to its result view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandOff {
    pub job_id: String,
    pub result_id: String,
}

/// A client-level event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ClientEvent {
    /// The live stream connection changed state.
    StreamStateChanged { state: ConnectionState },

    /// The live stream transport reported an error.
    StreamError { error: String },

    /// A poll response reported a non-terminal job.
    JobProgress {
        job_id: String,
        status: JobStatus,
        /// Completion percentage (0-100).
        percent: u8,
    },

    /// The job finished; fired at most once per watched job.
    JobCompleted(HandOff),

    /// The server reported the job as failed.
    JobFailed { job_id: String, error: String },

    /// A poll request failed; polling continues.
    JobPollFailed { job_id: String, error: String },
}
