//! Computes and reads `(branch_key, class_bucket)` competitor aggregates.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use pricing_store::document::{to_body, Document};
use pricing_store::store::DocumentStore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::stats::compute;

const WINDOW_HOURS: i64 = 6;
const WIDE_WINDOW_HOURS: i64 = 168;
const STALE_AFTER_HOURS: i64 = 12;

const COMPETITOR_PRICES: &str = "competitor_prices";
const COMPETITOR_AGGREGATES: &str = "competitor_aggregates";

/// One `(branch_key, class_bucket)` aggregate document, per spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorAggregate {
    pub branch_key: String,
    pub class_bucket: String,
    pub count: usize,
    pub min: f64,
    pub median: f64,
    pub mean: f64,
    pub p75: f64,
    pub p90: f64,
    pub std: f64,
    pub providers_used: Vec<String>,
    pub newest_scraped_at: DateTime<Utc>,
    pub is_stale: bool,
}

fn aggregate_id(branch_key: &str, class_bucket: &str) -> String {
    format!("{branch_key}_{class_bucket}")
}

/// Recomputes every `(branch_key, class_bucket)` aggregate observed among
/// competitor snapshots from the last six hours and writes each with merge
/// semantics. Keys with no samples in the window are left untouched (no
/// document is written, none is deleted).
pub async fn refresh_aggregates(store: &dyn DocumentStore, now: DateTime<Utc>) -> Result<usize, pricing_store::StoreError> {
    let cutoff = now - Duration::hours(WINDOW_HOURS);
    let snapshots = store.query(COMPETITOR_PRICES).await?;

    let mut buckets: BTreeMap<(String, String), Vec<(f64, String, DateTime<Utc>)>> = BTreeMap::new();
    for doc in &snapshots {
        if doc.created_at < cutoff {
            continue;
        }
        let Some(branch_key) = doc.body.get("branch_key").and_then(|v| v.as_str()) else { continue };
        let Some(class_bucket) = doc.body.get("class_bucket").and_then(|v| v.as_str()) else { continue };
        let Some(price) = doc.body.get("price_per_day").and_then(|v| v.as_f64()) else { continue };
        let provider = doc.body.get("provider").and_then(|v| v.as_str()).unwrap_or("unknown").to_string();
        let scraped_at = doc.body.get("scraped_at").and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(doc.created_at);
        buckets.entry((branch_key.to_string(), class_bucket.to_string()))
            .or_default()
            .push((price, provider, scraped_at));
    }

    let mut written = 0;
    for ((branch_key, class_bucket), samples) in buckets {
        let prices: Vec<f64> = samples.iter().map(|(p, _, _)| *p).collect();
        let Some(stats) = compute(&prices) else { continue };
        let providers_used: BTreeSet<String> = samples.iter().map(|(_, p, _)| p.clone()).collect();
        let newest_scraped_at = samples.iter().map(|(_, _, ts)| *ts).max().unwrap_or(now);
        let is_stale = now - newest_scraped_at > Duration::hours(STALE_AFTER_HOURS);

        let aggregate = CompetitorAggregate {
            branch_key: branch_key.clone(),
            class_bucket: class_bucket.clone(),
            count: stats.count,
            min: stats.min,
            median: stats.median,
            mean: stats.mean,
            p75: stats.p75,
            p90: stats.p90,
            std: stats.std,
            providers_used: providers_used.into_iter().collect(),
            newest_scraped_at,
            is_stale,
        };

        let id = aggregate_id(&branch_key, &class_bucket);
        let body = to_body(&aggregate)?;
        store.put(Document { collection: COMPETITOR_AGGREGATES.to_string(), id, body, created_at: now, updated_at: now }).await?;
        written += 1;
    }

    debug!(written, "refreshed competitor aggregates");
    Ok(written)
}

/// Reads the aggregate for `(branch_key, class_bucket)`. Falls back to
/// recomputing over the widened 168h window when no fresh 6h aggregate
/// exists; marks `is_stale=true` when the newest sample is older than
/// [`STALE_AFTER_HOURS`] but still returns the record.
pub async fn read_aggregate(
    store: &dyn DocumentStore,
    branch_key: &str,
    class_bucket: &str,
    now: DateTime<Utc>,
) -> Result<Option<CompetitorAggregate>, pricing_store::StoreError> {
    let id = aggregate_id(branch_key, class_bucket);
    if let Some(doc) = store.get(COMPETITOR_AGGREGATES, &id).await? {
        if let Ok(aggregate) = doc.into_typed::<CompetitorAggregate>() {
            return Ok(Some(aggregate));
        }
    }

    // Widen the window and recompute in-memory without persisting, since the
    // 6h write path already owns this collection's documents.
    let cutoff = now - Duration::hours(WIDE_WINDOW_HOURS);
    let snapshots = store.query(COMPETITOR_PRICES).await?;
    let mut prices = Vec::new();
    let mut providers: BTreeSet<String> = BTreeSet::new();
    let mut newest: Option<DateTime<Utc>> = None;
    for doc in &snapshots {
        if doc.created_at < cutoff {
            continue;
        }
        if doc.body.get("branch_key").and_then(|v| v.as_str()) != Some(branch_key) {
            continue;
        }
        if doc.body.get("class_bucket").and_then(|v| v.as_str()) != Some(class_bucket) {
            continue;
        }
        let Some(price) = doc.body.get("price_per_day").and_then(|v| v.as_f64()) else { continue };
        prices.push(price);
        if let Some(p) = doc.body.get("provider").and_then(|v| v.as_str()) {
            providers.insert(p.to_string());
        }
        newest = Some(newest.map_or(doc.created_at, |n: DateTime<Utc>| n.max(doc.created_at)));
    }

    let Some(stats) = compute(&prices) else { return Ok(None) };
    let newest_scraped_at = newest.unwrap_or(now);
    Ok(Some(CompetitorAggregate {
        branch_key: branch_key.to_string(),
        class_bucket: class_bucket.to_string(),
        count: stats.count,
        min: stats.min,
        median: stats.median,
        mean: stats.mean,
        p75: stats.p75,
        p90: stats.p90,
        std: stats.std,
        providers_used: providers.into_iter().collect(),
        newest_scraped_at,
        is_stale: now - newest_scraped_at > Duration::hours(STALE_AFTER_HOURS),
    }))
}
