//! Shared domain types for the LaneGuard detection client.
//!
//! Everything in this crate is transport-agnostic: the wire data model,
//! the pure geometry and risk mapping used by the overlay, request
//! parameter sets, and the generation tokens that guard async state.

pub mod error;
pub mod generation;
pub mod geometry;
pub mod params;
pub mod risk;
pub mod types;

pub use error::CoreError;
pub use generation::{Generation, Generations};
pub use risk::RiskLevel;
