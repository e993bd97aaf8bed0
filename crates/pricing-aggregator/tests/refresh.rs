use chrono::{Duration, Utc};
use pricing_aggregator::{read_aggregate, refresh_aggregates};
use pricing_store::document::Document;
use pricing_store::memory_store::InMemoryStore;
use pricing_store::store::DocumentStore;
use serde_json::json;

fn snapshot(branch_key: &str, class_bucket: &str, provider: &str, price: f64, age: Duration, now: chrono::DateTime<Utc>) -> Document {
    let created_at = now - age;
    Document {
        collection: "competitor_prices".to_string(),
        id: uuid::Uuid::new_v4().to_string(),
        body: json!({
            "branch_key": branch_key,
            "class_bucket": class_bucket,
            "provider": provider,
            "price_per_day": price,
            "scraped_at": created_at.to_rfc3339(),
        }),
        created_at,
        updated_at: created_at,
    }
}

#[tokio::test]
async fn refresh_computes_aggregate_for_fresh_window() {
    let store = InMemoryStore::new();
    let now = Utc::now();
    for price in [100.0, 150.0, 200.0] {
        store.put(snapshot("riy-001", "Sedan", "yelo", price, Duration::hours(1), now)).await.unwrap();
    }
    // Outside the 6h window, should not be counted.
    store.put(snapshot("riy-001", "Sedan", "theeb", 900.0, Duration::hours(10), now)).await.unwrap();

    let written = refresh_aggregates(&store, now).await.unwrap();
    assert_eq!(written, 1);

    let aggregate = read_aggregate(&store, "riy-001", "Sedan", now).await.unwrap().unwrap();
    assert_eq!(aggregate.count, 3);
    assert_eq!(aggregate.median, 150.0);
    assert!(!aggregate.is_stale);
}

#[tokio::test]
async fn read_falls_back_to_widened_window_when_no_fresh_aggregate() {
    let store = InMemoryStore::new();
    let now = Utc::now();
    // Only an old sample, outside 6h but inside 168h.
    store.put(snapshot("jed-002", "SUV", "lumi", 400.0, Duration::hours(20), now)).await.unwrap();

    let aggregate = read_aggregate(&store, "jed-002", "SUV", now).await.unwrap().unwrap();
    assert_eq!(aggregate.count, 1);
    assert!(aggregate.is_stale, "older than 12h should be marked stale");
}

#[tokio::test]
async fn missing_key_yields_no_aggregate() {
    let store = InMemoryStore::new();
    let now = Utc::now();
    let aggregate = read_aggregate(&store, "no-such-branch", "Sedan", now).await.unwrap();
    assert!(aggregate.is_none());
}
