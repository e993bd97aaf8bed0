//! Error taxonomy for the document store.

use thiserror::Error;

/// Errors returned by a [`crate::store::DocumentStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No document exists at `collection`/`id`.
    #[error("document not found: {collection}/{id}")]
    NotFound {
        /// Collection the lookup was scoped to.
        collection: String,
        /// Document id that was not found.
        id: String,
    },

    /// A transaction could not make progress after retrying and had to give up.
    #[error("transaction conflict after {attempts} attempt(s)")]
    Conflict {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// The transaction body rejected its own write for a domain reason
    /// (e.g. a validation failure read mid-transaction). Never retried.
    #[error("transaction aborted: {0}")]
    Aborted(String),

    /// The document body did not deserialize into the type the caller asked for.
    #[error("malformed document at {collection}/{id}: {source}")]
    Malformed {
        /// Collection of the offending document.
        collection: String,
        /// Id of the offending document.
        id: String,
        /// Underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },

    /// The underlying database rejected the operation.
    #[error("backend error: {0}")]
    Backend(#[from] diesel::result::Error),

    /// The connection pool could not hand out a connection.
    #[error("pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    /// A blocking task running the store operation panicked or was cancelled.
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
