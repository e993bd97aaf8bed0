//! Error taxonomy for the quote pricing engine.

use thiserror::Error;

/// Errors surfaced by [`crate::quote::quote`]. Per-vehicle model/guardrail
/// failures never reach here — they fall back to a base-rate breakdown
/// instead, per spec §4.6.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The request named no vehicles.
    #[error("quote request must include at least one vehicle")]
    EmptyRequest,

    /// The underlying document store failed.
    #[error("store error: {0}")]
    Store(#[from] pricing_store::StoreError),
}
