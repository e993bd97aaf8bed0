mod common;

use common::setup_db;
use pricing_store::db::connection::build_pool;
use pricing_store::document::Document;
use pricing_store::sqlite_store::SqliteStore;
use pricing_store::store::{BatchOp, DocumentStore};
use serde_json::json;

async fn sqlite_store() -> (common::TestDb, SqliteStore) {
    let (db, _conn) = setup_db();
    let pool = build_pool(&db.path, 4).expect("pool");
    (db, SqliteStore::new(pool))
}

#[tokio::test]
async fn put_then_get_round_trips() {
    let (_db, store) = sqlite_store().await;
    let now = chrono::Utc::now();
    let doc = Document {
        collection: "branches".to_string(),
        id: "riy-001".to_string(),
        body: json!({"name": "Riyadh Central", "city": "Riyadh"}),
        created_at: now,
        updated_at: now,
    };
    store.put(doc.clone()).await.expect("put");

    let fetched = store.get("branches", "riy-001").await.expect("get").expect("present");
    assert_eq!(fetched.body, doc.body);
}

#[tokio::test]
async fn get_missing_returns_none() {
    let (_db, store) = sqlite_store().await;
    let fetched = store.get("branches", "does-not-exist").await.expect("get");
    assert!(fetched.is_none());
}

#[tokio::test]
async fn patch_merges_and_creates_when_absent() {
    let (_db, store) = sqlite_store().await;
    let doc = store
        .patch("quote_cache", "riy-001:1:D1", json!({"price": 109.0}))
        .await
        .expect("patch");
    assert_eq!(doc.body["price"], 109.0);

    let doc = store
        .patch("quote_cache", "riy-001:1:D1", json!({"stale": true}))
        .await
        .expect("patch");
    assert_eq!(doc.body["price"], 109.0);
    assert_eq!(doc.body["stale"], true);
}

#[tokio::test]
async fn delete_then_get_returns_none() {
    let (_db, store) = sqlite_store().await;
    let now = chrono::Utc::now();
    store
        .put(Document {
            collection: "vehicles".to_string(),
            id: "v-1".to_string(),
            body: json!({"plate": "ABC-123"}),
            created_at: now,
            updated_at: now,
        })
        .await
        .expect("put");
    store.delete("vehicles", "v-1").await.expect("delete");
    assert!(store.get("vehicles", "v-1").await.expect("get").is_none());
}

#[tokio::test]
async fn query_returns_only_matching_collection() {
    let (_db, store) = sqlite_store().await;
    let now = chrono::Utc::now();
    for (collection, id) in [("branches", "a"), ("branches", "b"), ("vehicles", "c")] {
        store
            .put(Document {
                collection: collection.to_string(),
                id: id.to_string(),
                body: json!({}),
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("put");
    }
    let branches = store.query("branches").await.expect("query");
    assert_eq!(branches.len(), 2);
}

#[tokio::test]
async fn batch_applies_all_ops_atomically() {
    let (_db, store) = sqlite_store().await;
    let now = chrono::Utc::now();
    store
        .batch(vec![
            BatchOp::Put(Document {
                collection: "competitor_prices".to_string(),
                id: "o1".to_string(),
                body: json!({"price_per_day": 180.0}),
                created_at: now,
                updated_at: now,
            }),
            BatchOp::Put(Document {
                collection: "competitor_prices".to_string(),
                id: "o2".to_string(),
                body: json!({"price_per_day": 210.0}),
                created_at: now,
                updated_at: now,
            }),
        ])
        .await
        .expect("batch");

    assert_eq!(store.query("competitor_prices").await.expect("query").len(), 2);

    store
        .batch(vec![BatchOp::Delete { collection: "competitor_prices".to_string(), id: "o1".to_string() }])
        .await
        .expect("batch delete");
    assert_eq!(store.query("competitor_prices").await.expect("query").len(), 1);
}

#[tokio::test]
async fn transaction_commits_and_returns_value() {
    let (_db, store) = sqlite_store().await;
    let result = store
        .transaction(
            3,
            Box::new(|tx| {
                tx.put(Document {
                    collection: "locks".to_string(),
                    id: "scheduler".to_string(),
                    body: json!({"owner": "worker-1"}),
                    created_at: chrono::Utc::now(),
                    updated_at: chrono::Utc::now(),
                })?;
                Ok(json!({"ok": true}))
            }),
        )
        .await
        .expect("transaction");
    assert_eq!(result, json!({"ok": true}));

    let doc = store.get("locks", "scheduler").await.expect("get").expect("present");
    assert_eq!(doc.body["owner"], "worker-1");
}

#[tokio::test]
async fn transaction_rolls_back_on_error() {
    let (_db, store) = sqlite_store().await;
    let outcome = store
        .transaction(
            1,
            Box::new(|tx| {
                tx.put(Document {
                    collection: "locks".to_string(),
                    id: "scheduler".to_string(),
                    body: json!({"owner": "worker-1"}),
                    created_at: chrono::Utc::now(),
                    updated_at: chrono::Utc::now(),
                })?;
                Err(pricing_store::StoreError::Conflict { attempts: 1 })
            }),
        )
        .await;
    assert!(outcome.is_err());
    assert!(store.get("locks", "scheduler").await.expect("get").is_none());
}
