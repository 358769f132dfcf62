//! Detection service WebSocket and REST client library.
//!
//! Provides typed stream message parsing, the live stream connection
//! manager, HTTP API wrappers, the job status poller, the results
//! timeline synchronizer, and client event types for front-ends built on
//! top of the LaneGuard detection service.

pub mod api;
pub mod client;
pub mod events;
pub mod messages;
pub mod poller;
pub mod slot;
pub mod stream;
pub mod timeline;
