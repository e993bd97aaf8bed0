//! Process-wide cache of branch targets, loaded once from the store and
//! atomically swapped on reload.
//!
//! Readers call [`BranchCache::get_or_load`], an atomic pointer load with no
//! locking contention on the hot path. The first caller to find the cache
//! empty pays the store query under [`BranchCache::reload_lock`]; everyone
//! else just reads the swapped-in snapshot.

use std::sync::Arc;

use arc_swap::ArcSwap;
use pricing_scraper::BranchTarget;
use pricing_store::store::DocumentStore;
use tokio::sync::Mutex;

const BRANCHES: &str = "branches";

pub struct BranchCache {
    branches: ArcSwap<Vec<BranchTarget>>,
    reload_lock: Mutex<()>,
}

impl BranchCache {
    /// Starts out empty; the first `get_or_load` call populates it from `store`.
    pub fn empty() -> Self {
        Self { branches: ArcSwap::from_pointee(Vec::new()), reload_lock: Mutex::new(()) }
    }

    /// Returns the cached branch list, loading it from `store` on first use.
    /// Concurrent callers racing an empty cache serialize on `reload_lock`;
    /// whichever one wins re-checks the cache before querying again.
    pub async fn get_or_load(&self, store: &dyn DocumentStore) -> Result<Arc<Vec<BranchTarget>>, pricing_store::StoreError> {
        let current = self.branches.load_full();
        if !current.is_empty() {
            return Ok(current);
        }

        let _guard = self.reload_lock.lock().await;
        let current = self.branches.load_full();
        if !current.is_empty() {
            return Ok(current);
        }

        let loaded = Arc::new(query_branches(store).await?);
        self.branches.store(loaded.clone());
        Ok(loaded)
    }

    /// Forces a reload from `store` regardless of what's currently cached,
    /// and atomically swaps it in.
    pub async fn reload(&self, store: &dyn DocumentStore) -> Result<Arc<Vec<BranchTarget>>, pricing_store::StoreError> {
        let _guard = self.reload_lock.lock().await;
        let loaded = Arc::new(query_branches(store).await?);
        self.branches.store(loaded.clone());
        Ok(loaded)
    }
}

async fn query_branches(store: &dyn DocumentStore) -> Result<Vec<BranchTarget>, pricing_store::StoreError> {
    let docs = store.query(BRANCHES).await?;
    Ok(docs
        .iter()
        .filter_map(|d| {
            let branch_key = d.body.get("branch_key")?.as_str()?.to_string();
            let city = d.body.get("city")?.as_str()?.to_string();
            Some(BranchTarget { branch_key, city })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricing_store::document::Document;
    use pricing_store::memory_store::InMemoryStore;
    use serde_json::json;

    async fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .put(Document {
                collection: BRANCHES.to_string(),
                id: "riyadh-main".to_string(),
                body: json!({"branch_key": "riyadh-main", "city": "Riyadh"}),
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn first_call_loads_from_store_and_later_calls_reuse_the_snapshot() {
        let store = seeded_store().await;
        let cache = BranchCache::empty();

        let first = cache.get_or_load(&store).await.unwrap();
        assert_eq!(first.len(), 1);

        // Even if the store gains a branch afterward, the cached snapshot
        // doesn't change until an explicit reload.
        store
            .put(Document {
                collection: BRANCHES.to_string(),
                id: "jeddah-airport".to_string(),
                body: json!({"branch_key": "jeddah-airport", "city": "Jeddah"}),
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let second = cache.get_or_load(&store).await.unwrap();
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn reload_swaps_in_the_current_store_contents() {
        let store = seeded_store().await;
        let cache = BranchCache::empty();
        cache.get_or_load(&store).await.unwrap();

        store
            .put(Document {
                collection: BRANCHES.to_string(),
                id: "jeddah-airport".to_string(),
                body: json!({"branch_key": "jeddah-airport", "city": "Jeddah"}),
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let reloaded = cache.reload(&store).await.unwrap();
        assert_eq!(reloaded.len(), 2);
    }
}
