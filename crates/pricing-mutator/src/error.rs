//! Error taxonomy for the rate mutator.

use thiserror::Error;

/// Errors surfaced by [`crate::update_base_rate`] and [`crate::rollback`].
#[derive(Debug, Error)]
pub enum MutatorError {
    /// The named vehicle does not exist.
    #[error("vehicle not found: {0}")]
    NotFound(String),

    /// `new_rate` failed a business-rule check before any write happened.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Exactly one rollback target must be supplied.
    #[error("rollback requires exactly one of history_id or target_rate")]
    AmbiguousRollbackTarget,

    /// The referenced history entry does not exist.
    #[error("history entry not found: {0}")]
    HistoryNotFound(String),

    /// The underlying document store failed.
    #[error("store error: {0}")]
    Store(#[from] pricing_store::StoreError),
}
