//! The advisory quote cache: short-TTL per-vehicle price records keyed by
//! `branch_key_vehicleId_YYYYMMDD_durationKey`.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use pricing_store::document::{to_body, Document};
use pricing_store::store::DocumentStore;
use serde::{Deserialize, Serialize};

pub const FLEET_PRICES_CACHE: &str = "fleet_prices_cache";

/// One cached price for a `(branch, vehicle, pickup date, duration bucket)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub final_price_per_day: f64,
    pub total_price: f64,
    pub breakdown: std::collections::HashMap<String, f64>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Builds the cache id for a `(branch_key, vehicle_id, pickup date,
/// duration_key)` tuple.
pub fn cache_id(branch_key: &str, vehicle_id: &str, pickup_date: NaiveDate, duration_key: &str) -> String {
    format!("{branch_key}_{vehicle_id}_{}_{duration_key}", pickup_date.format("%Y%m%d"))
}

/// Reads a cache entry, returning `None` when absent or expired (`now >
/// expires_at`). An expired entry is left in place; it is never re-read as
/// valid but cleanup (L8) is responsible for eventually deleting it.
pub async fn read_cache(store: &dyn DocumentStore, id: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>, pricing_store::StoreError> {
    let Some(doc) = store.get(FLEET_PRICES_CACHE, id).await? else { return Ok(None) };
    let entry: CacheEntry = match doc.into_typed() {
        Ok(e) => e,
        Err(_) => return Ok(None),
    };
    if now > entry.expires_at {
        return Ok(None);
    }
    Ok(Some(entry))
}

/// Writes `entry` under `id` with `ttl` from `now`.
pub async fn write_cache(
    store: &dyn DocumentStore,
    id: &str,
    final_price_per_day: f64,
    total_price: f64,
    breakdown: std::collections::HashMap<String, f64>,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<(), pricing_store::StoreError> {
    let entry = CacheEntry { final_price_per_day, total_price, breakdown, created_at: now, expires_at: now + ttl };
    let body = to_body(&entry)?;
    store
        .put(Document { collection: FLEET_PRICES_CACHE.to_string(), id: id.to_string(), body, created_at: now, updated_at: now })
        .await
}
