//! In-process [`DocumentStore`] used by tests and by `USE_MOCK_STORE=true`.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::document::Document;
use crate::error::{StoreError, StoreResult};
use crate::store::{BatchOp, DocumentStore, Tx, TxBody};

type Key = (String, String);

/// A `HashMap`-backed store with no persistence, guarded by a single mutex.
///
/// `transaction` holds the mutex for the whole body, which is sufficient to
/// model the retry contract in tests without needing real SQLite lock
/// contention: the mutex never actually contends, so `body` always
/// succeeds on the first attempt here.
#[derive(Default)]
pub struct InMemoryStore {
    rows: Mutex<BTreeMap<Key, Document>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

struct MemoryTx<'a> {
    rows: &'a mut BTreeMap<Key, Document>,
}

impl Tx for MemoryTx<'_> {
    fn get(&mut self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        Ok(self.rows.get(&(collection.to_string(), id.to_string())).cloned())
    }

    fn put(&mut self, doc: Document) -> StoreResult<()> {
        self.rows.insert((doc.collection.clone(), doc.id.clone()), doc);
        Ok(())
    }

    fn patch(&mut self, collection: &str, id: &str, patch: Value) -> StoreResult<Document> {
        let key = (collection.to_string(), id.to_string());
        let now = Utc::now();
        let mut doc = self.rows.get(&key).cloned().unwrap_or_else(|| Document {
            collection: collection.to_string(),
            id: id.to_string(),
            body: Value::Object(Default::default()),
            created_at: now,
            updated_at: now,
        });
        if let (Value::Object(base), Value::Object(incoming)) = (&mut doc.body, patch.clone()) {
            base.extend(incoming);
        } else if let Value::Object(incoming) = patch {
            doc.body = Value::Object(incoming);
        }
        doc.updated_at = now;
        self.rows.insert(key, doc.clone());
        Ok(doc)
    }

    fn delete(&mut self, collection: &str, id: &str) -> StoreResult<()> {
        self.rows.remove(&(collection.to_string(), id.to_string()));
        Ok(())
    }

    fn query(&mut self, collection: &str) -> StoreResult<Vec<Document>> {
        Ok(self
            .rows
            .values()
            .filter(|d| d.collection == collection)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let rows = self.rows.lock().unwrap_or_else(|p| p.into_inner());
        Ok(rows.get(&(collection.to_string(), id.to_string())).cloned())
    }

    async fn put(&self, doc: Document) -> StoreResult<()> {
        let mut rows = self.rows.lock().unwrap_or_else(|p| p.into_inner());
        rows.insert((doc.collection.clone(), doc.id.clone()), doc);
        Ok(())
    }

    async fn patch(&self, collection: &str, id: &str, patch: Value) -> StoreResult<Document> {
        let mut rows = self.rows.lock().unwrap_or_else(|p| p.into_inner());
        let mut tx = MemoryTx { rows: &mut rows };
        tx.patch(collection, id, patch)
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let mut rows = self.rows.lock().unwrap_or_else(|p| p.into_inner());
        rows.remove(&(collection.to_string(), id.to_string()));
        Ok(())
    }

    async fn query(&self, collection: &str) -> StoreResult<Vec<Document>> {
        let rows = self.rows.lock().unwrap_or_else(|p| p.into_inner());
        Ok(rows
            .values()
            .filter(|d| d.collection == collection)
            .cloned()
            .collect())
    }

    async fn batch(&self, ops: Vec<BatchOp>) -> StoreResult<()> {
        let mut rows = self.rows.lock().unwrap_or_else(|p| p.into_inner());
        for op in ops {
            match op {
                BatchOp::Put(doc) => {
                    rows.insert((doc.collection.clone(), doc.id.clone()), doc);
                }
                BatchOp::Delete { collection, id } => {
                    rows.remove(&(collection, id));
                }
            }
        }
        Ok(())
    }

    async fn transaction(&self, max_attempts: u32, body: TxBody) -> StoreResult<Value> {
        if max_attempts == 0 {
            return Err(StoreError::Conflict { attempts: 0 });
        }
        let mut rows = self.rows.lock().unwrap_or_else(|p| p.into_inner());
        let mut tx = MemoryTx { rows: &mut rows };
        (body)(&mut tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(collection: &str, id: &str, body: Value) -> Document {
        let now = Utc::now();
        Document {
            collection: collection.to_string(),
            id: id.to_string(),
            body,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let store = InMemoryStore::new();
        store.put(doc("branches", "b1", json!({"name": "Jeddah"}))).await.unwrap();
        assert_eq!(store.get("branches", "b1").await.unwrap().unwrap().body["name"], "Jeddah");
        store.delete("branches", "b1").await.unwrap();
        assert!(store.get("branches", "b1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transaction_sees_its_own_writes() {
        let store = InMemoryStore::new();
        let result = store
            .transaction(
                1,
                Box::new(|tx| {
                    tx.put(doc("locks", "l1", json!({"owner": "a"})))?;
                    let readback = tx.get("locks", "l1")?.unwrap();
                    Ok(readback.body)
                }),
            )
            .await
            .unwrap();
        assert_eq!(result["owner"], "a");
    }

    #[tokio::test]
    async fn zero_attempts_is_a_conflict() {
        let store = InMemoryStore::new();
        let result = store.transaction(0, Box::new(|_tx| Ok(json!(null)))).await;
        assert!(matches!(result, Err(StoreError::Conflict { attempts: 0 })));
    }
}
