//! Demand index: conversion-rate signal over a one-hour window, with a
//! lead-time-based fallback heuristic when no signal exists yet.

use chrono::{DateTime, Duration, Utc};
use pricing_shared::time::is_weekend;
use pricing_store::document::{to_body, Document};
use pricing_store::store::DocumentStore;
use serde::{Deserialize, Serialize};

const QUOTES: &str = "pricing_decisions";
const BOOKINGS: &str = "bookings";
const DEMAND_SIGNALS: &str = "demand_signals";

/// A `(branch_key, class_bucket, hourBucket)` demand reading, per spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandSignal {
    pub branch_key: String,
    pub class_bucket: String,
    pub hour_bucket: String,
    pub quote_count: u32,
    pub booking_count: u32,
    pub conversion_rate: f64,
    pub demand_index: f64,
}

fn hour_bucket(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H").to_string()
}

fn signal_id(branch_key: &str, class_bucket: &str, hour_bucket: &str) -> String {
    format!("{branch_key}_{class_bucket}_{hour_bucket}")
}

/// Reads the current hour's persisted demand signal for `(branch_key,
/// class_bucket)`, if one has been computed yet.
pub async fn read_demand_signal(
    store: &dyn DocumentStore,
    branch_key: &str,
    class_bucket: &str,
    now: DateTime<Utc>,
) -> Result<Option<DemandSignal>, pricing_store::StoreError> {
    let id = signal_id(branch_key, class_bucket, &hour_bucket(now));
    match store.get(DEMAND_SIGNALS, &id).await? {
        Some(doc) => Ok(doc.into_typed().ok()),
        None => Ok(None),
    }
}

/// `demand_index = 0.4 * min(quote_count/10, 1) + 0.6 * conversion_rate`.
fn demand_index(quote_count: u32, conversion_rate: f64) -> f64 {
    0.4 * (quote_count as f64 / 10.0).min(1.0) + 0.6 * conversion_rate
}

/// Computes and writes the demand signal for `(branch_key, class_bucket)`
/// over the one hour ending at `now`.
pub async fn compute_demand_signal(
    store: &dyn DocumentStore,
    branch_key: &str,
    class_bucket: &str,
    now: DateTime<Utc>,
) -> Result<DemandSignal, pricing_store::StoreError> {
    let window_start = now - Duration::hours(1);

    let quotes = store.query(QUOTES).await?;
    let quote_count = quotes
        .iter()
        .filter(|d| d.created_at >= window_start && matches_key(d, branch_key, class_bucket))
        .count() as u32;

    let bookings = store.query(BOOKINGS).await?;
    let booking_count = bookings
        .iter()
        .filter(|d| d.created_at >= window_start && matches_key(d, branch_key, class_bucket))
        .count() as u32;

    let conversion_rate = if quote_count == 0 { 0.0 } else { booking_count as f64 / quote_count as f64 };
    let index = demand_index(quote_count, conversion_rate);

    let bucket = hour_bucket(now);
    let signal = DemandSignal {
        branch_key: branch_key.to_string(),
        class_bucket: class_bucket.to_string(),
        hour_bucket: bucket.clone(),
        quote_count,
        booking_count,
        conversion_rate,
        demand_index: index,
    };

    let id = signal_id(branch_key, class_bucket, &bucket);
    let body = to_body(&signal)?;
    store.put(Document { collection: DEMAND_SIGNALS.to_string(), id, body, created_at: now, updated_at: now }).await?;
    Ok(signal)
}

fn matches_key(doc: &Document, branch_key: &str, class_bucket: &str) -> bool {
    doc.body.get("branch_key").and_then(|v| v.as_str()) == Some(branch_key)
        && doc.body.get("class_bucket").and_then(|v| v.as_str()) == Some(class_bucket)
}

/// Fallback demand index applied when no signal exists yet for a
/// `(branch_key, class_bucket)` pair: a lead-time-based heuristic with a
/// Saudi-weekend pickup bonus.
pub fn fallback_demand_index(now: DateTime<Utc>, pickup_at: DateTime<Utc>) -> f64 {
    let lead_days = (pickup_at - now).num_days();
    let mut index = if lead_days <= 2 {
        0.75
    } else if lead_days <= 7 {
        0.6
    } else if lead_days <= 30 {
        0.5
    } else {
        0.4
    };
    if is_weekend(pickup_at) {
        index += 0.1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricing_store::memory_store::InMemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn demand_index_blends_volume_and_conversion() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        for _ in 0..5 {
            store
                .put(Document {
                    collection: QUOTES.to_string(),
                    id: uuid::Uuid::new_v4().to_string(),
                    body: json!({"branch_key": "riy-001", "class_bucket": "Sedan"}),
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap();
        }
        store
            .put(Document {
                collection: BOOKINGS.to_string(),
                id: uuid::Uuid::new_v4().to_string(),
                body: json!({"branch_key": "riy-001", "class_bucket": "Sedan"}),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let signal = compute_demand_signal(&store, "riy-001", "Sedan", now).await.unwrap();
        assert_eq!(signal.quote_count, 5);
        assert_eq!(signal.booking_count, 1);
        assert_eq!(signal.conversion_rate, 0.2);
        assert!((signal.demand_index - (0.4 * 0.5 + 0.6 * 0.2)).abs() < 1e-9);
    }

    #[test]
    fn fallback_uses_lead_time_buckets() {
        use chrono::TimeZone;
        // A fixed, known-weekday anchor keeps this test independent of
        // today's actual weekday.
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap(); // Monday
        assert_eq!(fallback_demand_index(now, now + Duration::days(1)), 0.75);
        assert_eq!(fallback_demand_index(now, now + Duration::days(5)), 0.6);
        assert_eq!(fallback_demand_index(now, now + Duration::days(20)), 0.5);
        assert_eq!(fallback_demand_index(now, now + Duration::days(60)), 0.4);
    }

    #[test]
    fn weekend_pickup_adds_bonus() {
        use chrono::TimeZone;
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap(); // Monday
        let thursday_pickup = now + Duration::days(3); // Thursday, lead=3 -> base 0.6
        assert!(is_weekend(thursday_pickup));
        assert_eq!(fallback_demand_index(now, thursday_pickup), 0.7);
    }
}
