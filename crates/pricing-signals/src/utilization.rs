//! Utilization snapshots: booked vs. available fleet for a target date.

use chrono::{DateTime, NaiveDate, Utc};
use pricing_store::document::{to_body, Document};
use pricing_store::store::DocumentStore;
use serde::{Deserialize, Serialize};

const VEHICLES: &str = "vehicles";
const BOOKINGS: &str = "bookings";
const UTILIZATION_SNAPSHOTS: &str = "utilization_snapshots";

/// Booking statuses counted as occupying a vehicle for utilization purposes.
const OCCUPYING_STATUSES: &[&str] = &["confirmed", "active"];

/// A `(branch_key, class_bucket, date)` utilization reading, per spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilizationSnapshot {
    pub branch_key: String,
    pub class_bucket: String,
    pub target_date: NaiveDate,
    pub total_fleet: u32,
    pub booked: u32,
    pub available: u32,
    pub utilization_rate: Option<f64>,
}

fn snapshot_id(branch_key: &str, class_bucket: &str, target_date: NaiveDate) -> String {
    format!("{branch_key}_{class_bucket}_{target_date}")
}

/// Computes and writes the utilization snapshot for `(branch_key,
/// class_bucket, target_date)`. `utilization_rate` is `None` when the fleet
/// is empty, per spec §4.4 ("undefined when total=0").
pub async fn compute_utilization(
    store: &dyn DocumentStore,
    branch_key: &str,
    class_bucket: &str,
    target_date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<UtilizationSnapshot, pricing_store::StoreError> {
    let vehicles = store.query(VEHICLES).await?;
    let total_fleet = vehicles
        .iter()
        .filter(|v| {
            v.body.get("branch_key").and_then(|b| b.as_str()) == Some(branch_key)
                && v.body.get("class_bucket").and_then(|c| c.as_str()) == Some(class_bucket)
        })
        .count() as u32;

    let bookings = store.query(BOOKINGS).await?;
    let booked = bookings
        .iter()
        .filter(|b| booking_matches(b, branch_key, class_bucket, target_date))
        .count() as u32;

    let available = total_fleet.saturating_sub(booked);
    let utilization_rate = if total_fleet == 0 { None } else { Some(booked as f64 / total_fleet as f64) };

    let snapshot = UtilizationSnapshot {
        branch_key: branch_key.to_string(),
        class_bucket: class_bucket.to_string(),
        target_date,
        total_fleet,
        booked,
        available,
        utilization_rate,
    };

    let id = snapshot_id(branch_key, class_bucket, target_date);
    let body = to_body(&snapshot)?;
    store
        .put(Document { collection: UTILIZATION_SNAPSHOTS.to_string(), id, body, created_at: now, updated_at: now })
        .await?;
    Ok(snapshot)
}

fn booking_matches(doc: &Document, branch_key: &str, class_bucket: &str, target_date: NaiveDate) -> bool {
    if doc.body.get("branch_key").and_then(|v| v.as_str()) != Some(branch_key) {
        return false;
    }
    if doc.body.get("class_bucket").and_then(|v| v.as_str()) != Some(class_bucket) {
        return false;
    }
    let status = doc.body.get("status").and_then(|v| v.as_str()).unwrap_or("");
    if !OCCUPYING_STATUSES.contains(&status) {
        return false;
    }
    let Some(start) = doc.body.get("start_date").and_then(|v| v.as_str()).and_then(|s| s.parse::<NaiveDate>().ok()) else { return false };
    let Some(end) = doc.body.get("end_date").and_then(|v| v.as_str()).and_then(|s| s.parse::<NaiveDate>().ok()) else { return false };
    start <= target_date && target_date <= end
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricing_store::memory_store::InMemoryStore;
    use serde_json::json;

    fn vehicle(branch_key: &str, class_bucket: &str) -> Document {
        let now = Utc::now();
        Document {
            collection: VEHICLES.to_string(),
            id: uuid::Uuid::new_v4().to_string(),
            body: json!({"branch_key": branch_key, "class_bucket": class_bucket}),
            created_at: now,
            updated_at: now,
        }
    }

    fn booking(branch_key: &str, class_bucket: &str, status: &str, start: &str, end: &str) -> Document {
        let now = Utc::now();
        Document {
            collection: BOOKINGS.to_string(),
            id: uuid::Uuid::new_v4().to_string(),
            body: json!({
                "branch_key": branch_key, "class_bucket": class_bucket,
                "status": status, "start_date": start, "end_date": end
            }),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn utilization_rate_counts_overlapping_confirmed_bookings() {
        let store = InMemoryStore::new();
        for _ in 0..4 {
            store.put(vehicle("riy-001", "Sedan")).await.unwrap();
        }
        store.put(booking("riy-001", "Sedan", "confirmed", "2026-03-01", "2026-03-05")).await.unwrap();
        store.put(booking("riy-001", "Sedan", "cancelled", "2026-03-01", "2026-03-05")).await.unwrap();

        let target = "2026-03-03".parse().unwrap();
        let snapshot = compute_utilization(&store, "riy-001", "Sedan", target, Utc::now()).await.unwrap();
        assert_eq!(snapshot.total_fleet, 4);
        assert_eq!(snapshot.booked, 1);
        assert_eq!(snapshot.utilization_rate, Some(0.25));
    }

    #[tokio::test]
    async fn empty_fleet_has_undefined_rate() {
        let store = InMemoryStore::new();
        let target = "2026-03-03".parse().unwrap();
        let snapshot = compute_utilization(&store, "jed-002", "Luxury", target, Utc::now()).await.unwrap();
        assert_eq!(snapshot.total_fleet, 0);
        assert_eq!(snapshot.utilization_rate, None);
    }
}
