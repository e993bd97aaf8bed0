//! The store abstraction every other crate in the pricing core talks to.
//!
//! [`DocumentStore`] is intentionally free of generics so it can be boxed as
//! `Arc<dyn DocumentStore>` and swapped between [`crate::sqlite_store::SqliteStore`]
//! and [`crate::memory_store::InMemoryStore`] at startup, mirroring the way the
//! scraper's `PageFetcher` trait lets a provider be picked at runtime.

use async_trait::async_trait;
use serde_json::Value;

use crate::document::Document;
use crate::error::StoreResult;

/// Synchronous handle into an in-flight transaction.
///
/// Implementations run transaction bodies on a blocking thread, so `Tx`
/// methods are plain (non-async) calls against a live connection/lock.
pub trait Tx {
    /// Reads a document, returning `Ok(None)` if it does not exist.
    fn get(&mut self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Inserts or fully overwrites a document.
    fn put(&mut self, doc: Document) -> StoreResult<()>;

    /// Shallow-merges `patch`'s object keys into the existing document's body
    /// (inserting it first if absent) and returns the resulting document.
    fn patch(&mut self, collection: &str, id: &str, patch: Value) -> StoreResult<Document>;

    /// Removes a document. A missing document is not an error.
    fn delete(&mut self, collection: &str, id: &str) -> StoreResult<()>;

    /// Returns every document currently in `collection`.
    fn query(&mut self, collection: &str) -> StoreResult<Vec<Document>>;
}

/// A closure run inside a store transaction. It receives a [`Tx`] and
/// returns the value the caller wants back out once the transaction commits.
pub type TxBody = Box<dyn Fn(&mut dyn Tx) -> StoreResult<Value> + Send + Sync>;

/// A single write in a [`DocumentStore::batch`] call.
#[derive(Debug, Clone)]
pub enum BatchOp {
    /// Insert-or-overwrite `doc`.
    Put(Document),
    /// Remove the document at `collection`/`id`.
    Delete {
        /// Collection of the document to remove.
        collection: String,
        /// Id of the document to remove.
        id: String,
    },
}

/// Document/collection store with optimistic-retry transactions.
///
/// Every method here corresponds to the storage contract the layers above
/// (market aggregator, rule engine, rate mutator, scheduler) are written
/// against; none of them know or care whether the backing store is SQLite
/// or the in-memory test double.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads a single document, returning `Ok(None)` if it does not exist.
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Inserts or fully overwrites a document.
    async fn put(&self, doc: Document) -> StoreResult<()>;

    /// Shallow-merges `patch`'s object keys into the existing document
    /// (creating it if absent) and returns the resulting document.
    async fn patch(&self, collection: &str, id: &str, patch: Value) -> StoreResult<Document>;

    /// Removes a document. A missing document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;

    /// Returns every document in `collection`. Callers filter client-side;
    /// collections in this system are small enough (branches, vehicles,
    /// per-branch locks) that a secondary index is not worth the complexity.
    async fn query(&self, collection: &str) -> StoreResult<Vec<Document>>;

    /// Applies every op in `ops` as a single unit; used by writers (e.g. the
    /// scrape orchestrator) that commit many documents together instead of
    /// one round trip each.
    async fn batch(&self, ops: Vec<BatchOp>) -> StoreResult<()>;

    /// Runs `body` inside a transaction, retrying up to `max_attempts` times
    /// if the backend reports a write conflict (SQLITE_BUSY / lock
    /// contention). Returns [`crate::error::StoreError::Conflict`] once
    /// attempts are exhausted.
    async fn transaction(&self, max_attempts: u32, body: TxBody) -> StoreResult<Value>;
}
