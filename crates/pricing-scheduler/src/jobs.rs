//! The three periodic jobs the supervisor drives: full-grid scrape,
//! lite-refresh, and cleanup, each guarded by a distributed lock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use pricing_scraper::providers::PageFetcher;
use pricing_shared::config::ScrapeMode;
use pricing_store::store::DocumentStore;
use tracing::{info, warn};

use crate::branch_cache::BranchCache;
use crate::lock::{acquire_lock, LockGuard, LockOutcome};
use crate::run_log::{write_run_log, JobRunRecord, RunStatus};

const DEFAULT_LOCK_TTL_MINUTES: i64 = 30;
const DEFAULT_WORKER_ID: &str = "scheduler";

const FULL_GRID_SCRAPE: &str = "full_grid_scrape";
const LITE_REFRESH: &str = "lite_refresh";
const CLEANUP: &str = "cleanup";

/// Runs the daily full-grid scrape, then refreshes competitor aggregates
/// over everything it just wrote. `branches` is loaded once per process by
/// [`BranchCache`] and read-only after that; pass the same cache across runs.
pub async fn run_full_grid_scrape(
    store: &dyn DocumentStore,
    branches: &BranchCache,
    fetcher: Arc<dyn PageFetcher>,
    now: DateTime<Utc>,
) -> Result<(), pricing_store::StoreError> {
    run_locked_job(store, FULL_GRID_SCRAPE, now, move |store, now| async move {
        let branches = branches.get_or_load(store).await?;
        let summary = pricing_scraper::run_scrape(store, fetcher, &branches[..], ScrapeMode::FullGrid, now).await;
        let aggregates_written = pricing_aggregator::refresh_aggregates(store, now).await?;

        let mut counts = HashMap::new();
        counts.insert("total_offers".to_string(), summary.total_offers as u64);
        counts.insert("total_new".to_string(), summary.total_new as u64);
        counts.insert("providers_scraped".to_string(), summary.providers_scraped as u64);
        counts.insert("aggregates_written".to_string(), aggregates_written as u64);
        if !summary.errors.is_empty() {
            warn!(errors = ?summary.errors, "full-grid scrape completed with per-cell errors");
        }
        Ok(counts)
    })
    .await
}

/// Runs the lite-refresh job: a narrower airport/key-category grid, every
/// [`pricing_shared::config::PricingConfig::lite_refresh_interval_hours`].
pub async fn run_lite_refresh(
    store: &dyn DocumentStore,
    branches: &BranchCache,
    fetcher: Arc<dyn PageFetcher>,
    now: DateTime<Utc>,
) -> Result<(), pricing_store::StoreError> {
    run_locked_job(store, LITE_REFRESH, now, move |store, now| async move {
        let branches = branches.get_or_load(store).await?;
        let summary = pricing_scraper::run_scrape(store, fetcher, &branches[..], ScrapeMode::AirportQuote, now).await;
        let aggregates_written = pricing_aggregator::refresh_aggregates(store, now).await?;

        let mut counts = HashMap::new();
        counts.insert("total_offers".to_string(), summary.total_offers as u64);
        counts.insert("total_new".to_string(), summary.total_new as u64);
        counts.insert("aggregates_written".to_string(), aggregates_written as u64);
        Ok(counts)
    })
    .await
}

/// Deletes stale competitor snapshots (>14d), expired quote cache entries,
/// and decisions older than 180d, in bounded batches of 500.
pub async fn run_cleanup(store: &dyn DocumentStore, now: DateTime<Utc>) -> Result<(), pricing_store::StoreError> {
    run_locked_job(store, CLEANUP, now, move |store, now| async move {
        let mut counts = HashMap::new();
        counts.insert(
            "competitor_prices_deleted".to_string(),
            delete_older_than(store, "competitor_prices", now - Duration::days(14)).await? as u64,
        );
        counts.insert(
            "cache_entries_deleted".to_string(),
            delete_expired_cache(store, "fleet_prices_cache", now).await? as u64,
        );
        counts.insert(
            "decisions_deleted".to_string(),
            delete_older_than(store, "pricing_decisions", now - Duration::days(180)).await? as u64,
        );
        Ok(counts)
    })
    .await
}

const CLEANUP_BATCH_SIZE: usize = 500;

async fn delete_older_than(store: &dyn DocumentStore, collection: &str, cutoff: DateTime<Utc>) -> Result<usize, pricing_store::StoreError> {
    let docs = store.query(collection).await?;
    let stale: Vec<_> = docs.into_iter().filter(|d| d.created_at < cutoff).take(CLEANUP_BATCH_SIZE).collect();
    let count = stale.len();
    for doc in stale {
        store.delete(collection, &doc.id).await?;
    }
    Ok(count)
}

async fn delete_expired_cache(store: &dyn DocumentStore, collection: &str, now: DateTime<Utc>) -> Result<usize, pricing_store::StoreError> {
    let docs = store.query(collection).await?;
    let expired: Vec<_> = docs
        .into_iter()
        .filter(|d| d.body.get("expires_at").and_then(|v| v.as_str()).and_then(|s| DateTime::parse_from_rfc3339(s).ok()).is_some_and(|exp| exp.with_timezone(&Utc) < now))
        .take(CLEANUP_BATCH_SIZE)
        .collect();
    let count = expired.len();
    for doc in expired {
        store.delete(collection, &doc.id).await?;
    }
    Ok(count)
}

/// Acquires `job_name`'s lock, runs `body`, writes the run log, and releases
/// the lock — whether `body` succeeded, failed, or the lock was already
/// held (in which case `body` never runs and a `skipped` record is logged).
async fn run_locked_job<'a, Fut>(
    store: &'a dyn DocumentStore,
    job_name: &str,
    now: DateTime<Utc>,
    body: impl FnOnce(&'a dyn DocumentStore, DateTime<Utc>) -> Fut,
) -> Result<(), pricing_store::StoreError>
where
    Fut: std::future::Future<Output = Result<HashMap<String, u64>, pricing_store::StoreError>> + 'a,
{
    let started_at = now;
    let lock_ttl = Duration::minutes(DEFAULT_LOCK_TTL_MINUTES);

    match acquire_lock(store, job_name, DEFAULT_WORKER_ID, lock_ttl, now).await? {
        LockOutcome::Skipped => {
            info!(job_name, "skipped: lock already held");
            write_run_log(
                store,
                &JobRunRecord {
                    job_name: job_name.to_string(),
                    started_at,
                    finished_at: started_at,
                    status: RunStatus::Skipped,
                    duration_ms: 0,
                    counts: HashMap::new(),
                    error: None,
                },
            )
            .await?;
            return Ok(());
        }
        LockOutcome::Acquired => {}
    }

    let guard = LockGuard::new(store, job_name);
    let result = body(store, now).await;
    let finished_at = Utc::now();
    let duration_ms = (finished_at - started_at).num_milliseconds().max(0);

    let (status, counts, error) = match &result {
        Ok(counts) => (RunStatus::Success, counts.clone(), None),
        Err(e) => (RunStatus::Fail, HashMap::new(), Some(e.to_string())),
    };

    write_run_log(
        store,
        &JobRunRecord { job_name: job_name.to_string(), started_at, finished_at, status, duration_ms, counts, error },
    )
    .await?;

    guard.release().await?;
    result.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricing_scraper::providers::ScriptedPageFetcher;
    use pricing_store::document::Document;
    use pricing_store::memory_store::InMemoryStore;

    fn empty_fetcher() -> Arc<dyn PageFetcher> {
        Arc::new(ScriptedPageFetcher::new())
    }

    #[tokio::test]
    async fn full_grid_scrape_writes_a_success_run_log_with_no_branches() {
        let store = InMemoryStore::new();
        let branches = BranchCache::empty();
        run_full_grid_scrape(&store, &branches, empty_fetcher(), Utc::now()).await.unwrap();

        let logs = store.query(crate::run_log::SCHEDULED_JOB_LOGS).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].body["job_name"], FULL_GRID_SCRAPE);
        assert_eq!(logs[0].body["status"], "success");
    }

    #[tokio::test]
    async fn second_run_while_first_lock_is_live_is_skipped() {
        let store = InMemoryStore::new();
        let branches = BranchCache::empty();
        let now = Utc::now();
        acquire_lock(&store, FULL_GRID_SCRAPE, "other-worker", Duration::minutes(30), now).await.unwrap();

        run_full_grid_scrape(&store, &branches, empty_fetcher(), now).await.unwrap();

        let logs = store.query(crate::run_log::SCHEDULED_JOB_LOGS).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].body["status"], "skipped");
    }

    #[tokio::test]
    async fn cleanup_deletes_stale_entries_and_leaves_fresh_ones() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let old = now - Duration::days(30);
        store
            .put(Document {
                collection: "competitor_prices".to_string(),
                id: "stale".to_string(),
                body: serde_json::json!({}),
                created_at: old,
                updated_at: old,
            })
            .await
            .unwrap();
        store
            .put(Document {
                collection: "competitor_prices".to_string(),
                id: "fresh".to_string(),
                body: serde_json::json!({}),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        run_cleanup(&store, now).await.unwrap();

        let remaining = store.query("competitor_prices").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "fresh");

        let logs = store.query(crate::run_log::SCHEDULED_JOB_LOGS).await.unwrap();
        assert_eq!(logs[0].body["counts"]["competitor_prices_deleted"], 1);
    }
}
