//! Distributed lock: a named lease row in the store, claimed through a
//! transaction and released through a scope guard.

use chrono::{DateTime, Duration, Utc};
use pricing_store::document::Document;
use pricing_store::error::StoreError;
use pricing_store::store::{DocumentStore, Tx, TxBody};
use serde_json::{json, Value};

pub const SCHEDULER_LOCKS: &str = "scheduler_locks";

/// Outcome of attempting to claim a named lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    /// The lock was claimed and is held until `expires_at`.
    Acquired,
    /// Another worker already holds a live lease; the caller should skip
    /// this run entirely.
    Skipped,
}

/// Attempts to claim the lock named `job_name` for `worker_id`, valid for
/// `ttl`. Re-checks the same "absent or expired" condition inside the
/// transaction that writes the new lease, mirroring an optimistic claim over
/// a lease row: read, recheck, write, all inside one commit.
pub async fn acquire_lock(
    store: &dyn DocumentStore,
    job_name: &str,
    worker_id: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<LockOutcome, StoreError> {
    let job_name_owned = job_name.to_string();
    let worker_id_owned = worker_id.to_string();
    let expires_at = now + ttl;

    let body: TxBody = Box::new(move |tx: &mut dyn Tx| claim(tx, &job_name_owned, &worker_id_owned, now, expires_at));

    let value = store.transaction(5, body).await?;
    Ok(if value["acquired"].as_bool().unwrap_or(false) { LockOutcome::Acquired } else { LockOutcome::Skipped })
}

fn claim(tx: &mut dyn Tx, job_name: &str, worker_id: &str, now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Result<Value, StoreError> {
    if let Some(existing) = tx.get(SCHEDULER_LOCKS, job_name)? {
        let still_valid = existing
            .body
            .get("expires_at")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc) > now)
            .unwrap_or(false);
        if still_valid {
            return Ok(json!({ "acquired": false }));
        }
    }

    tx.put(Document {
        collection: SCHEDULER_LOCKS.to_string(),
        id: job_name.to_string(),
        body: json!({ "acquired_at": now, "expires_at": expires_at, "worker_id": worker_id }),
        created_at: now,
        updated_at: now,
    })?;
    Ok(json!({ "acquired": true }))
}

/// Releases `job_name`'s lock immediately. Safe to call even if the lock was
/// never acquired or has already expired; a crashed worker simply leaves the
/// lease to expire on its own TTL.
pub async fn release_lock(store: &dyn DocumentStore, job_name: &str) -> Result<(), StoreError> {
    store.delete(SCHEDULER_LOCKS, job_name).await
}

/// A claimed lease, released explicitly once the job body finishes
/// (successfully or not). Callers must release this in every code path —
/// async `Drop` cannot await the store call, so an un-released guard simply
/// leaves the lease to expire on its TTL instead of being freed early.
pub struct LockGuard<'a> {
    store: &'a dyn DocumentStore,
    job_name: String,
}

impl<'a> LockGuard<'a> {
    pub fn new(store: &'a dyn DocumentStore, job_name: impl Into<String>) -> Self {
        Self { store, job_name: job_name.into() }
    }

    /// Releases the lock now.
    pub async fn release(self) -> Result<(), StoreError> {
        release_lock(self.store, &self.job_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricing_store::memory_store::InMemoryStore;

    #[tokio::test]
    async fn second_claim_is_skipped_while_first_is_live() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let first = acquire_lock(&store, "full_grid_scrape", "worker-a", Duration::minutes(30), now).await.unwrap();
        assert_eq!(first, LockOutcome::Acquired);

        let second = acquire_lock(&store, "full_grid_scrape", "worker-b", Duration::minutes(30), now).await.unwrap();
        assert_eq!(second, LockOutcome::Skipped);
    }

    #[tokio::test]
    async fn expired_lease_can_be_reclaimed() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        acquire_lock(&store, "full_grid_scrape", "worker-a", Duration::minutes(30), now - Duration::hours(1)).await.unwrap();

        let reclaimed = acquire_lock(&store, "full_grid_scrape", "worker-b", Duration::minutes(30), now).await.unwrap();
        assert_eq!(reclaimed, LockOutcome::Acquired);
    }

    #[tokio::test]
    async fn release_then_reacquire_succeeds_immediately() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        acquire_lock(&store, "lite_refresh", "worker-a", Duration::minutes(30), now).await.unwrap();
        release_lock(&store, "lite_refresh").await.unwrap();
        let reacquired = acquire_lock(&store, "lite_refresh", "worker-b", Duration::minutes(30), now).await.unwrap();
        assert_eq!(reacquired, LockOutcome::Acquired);
    }
}
