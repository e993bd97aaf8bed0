//! `rollback`: resolves a prior rate and replays it through
//! [`update_base_rate`] with an audit trail back to its source.

use chrono::{DateTime, Utc};
use pricing_store::store::DocumentStore;
use serde_json::json;

use crate::error::MutatorError;
use crate::rate::{update_base_rate, UpdateOutcome, VEHICLE_HISTORY};

/// Exactly one of these identifies the rate to roll back to.
#[derive(Debug, Clone)]
pub enum RollbackTarget {
    /// Roll back to the `old_base_daily_rate` recorded in this history entry.
    HistoryId(String),
    /// Roll back directly to this rate.
    TargetRate(f64),
}

impl RollbackTarget {
    /// Builds a target from the wire-level optional pair, per spec §6
    /// ("exactly one target form required").
    pub fn from_options(history_id: Option<String>, target_rate: Option<f64>) -> Result<Self, MutatorError> {
        match (history_id, target_rate) {
            (Some(id), None) => Ok(RollbackTarget::HistoryId(id)),
            (None, Some(rate)) => Ok(RollbackTarget::TargetRate(rate)),
            _ => Err(MutatorError::AmbiguousRollbackTarget),
        }
    }
}

/// Rolls `vehicle_id`'s base rate back to `target`, via the same
/// transactional path as any other rate update.
pub async fn rollback(
    store: &dyn DocumentStore,
    vehicle_id: &str,
    target: RollbackTarget,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<UpdateOutcome, MutatorError> {
    let (target_rate, context) = match &target {
        RollbackTarget::TargetRate(rate) => (*rate, json!({ "rollback_target_rate": rate })),
        RollbackTarget::HistoryId(history_id) => {
            let doc = store
                .get(VEHICLE_HISTORY, history_id)
                .await?
                .ok_or_else(|| MutatorError::HistoryNotFound(history_id.clone()))?;
            let rate = doc
                .body
                .get("old_base_daily_rate")
                .and_then(|v| v.as_f64())
                .ok_or_else(|| MutatorError::HistoryNotFound(history_id.clone()))?;
            (rate, json!({ "rollback_of_history_id": history_id }))
        }
    };

    let reason = reason.unwrap_or("rollback");
    update_base_rate(store, vehicle_id, target_rate, reason, "rollback", context, now).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate::VEHICLES;
    use pricing_store::memory_store::InMemoryStore;
    use pricing_store::Document;
    use serde_json::json;

    async fn seed_vehicle(store: &InMemoryStore, base_rate: f64) {
        let now = Utc::now();
        store
            .put(Document {
                collection: VEHICLES.to_string(),
                id: "veh-1".to_string(),
                body: json!({"base_daily_rate": base_rate, "cost_per_day": 100.0}),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rollback_by_history_id_restores_old_rate() {
        let store = InMemoryStore::new();
        seed_vehicle(&store, 150.0).await;
        let now = Utc::now();
        let first = update_base_rate(&store, "veh-1", 180.0, "manual", "operator:alice", json!({}), now).await.unwrap();
        let history_id = first.history_id.unwrap();

        let rolled_back = rollback(&store, "veh-1", RollbackTarget::HistoryId(history_id.clone()), None, now).await.unwrap();
        assert_eq!(rolled_back.new_rate, 150.0);
        assert_eq!(rolled_back.status, "applied");

        let history = store.query(VEHICLE_HISTORY).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].body["reason"], "rollback");
    }

    #[tokio::test]
    async fn rollback_by_target_rate_skips_history_lookup() {
        let store = InMemoryStore::new();
        seed_vehicle(&store, 150.0).await;
        let outcome = rollback(&store, "veh-1", RollbackTarget::TargetRate(120.0), None, Utc::now()).await.unwrap();
        assert_eq!(outcome.new_rate, 120.0);
    }

    #[test]
    fn from_options_rejects_both_or_neither() {
        assert!(matches!(RollbackTarget::from_options(None, None), Err(MutatorError::AmbiguousRollbackTarget)));
        assert!(matches!(
            RollbackTarget::from_options(Some("h1".to_string()), Some(10.0)),
            Err(MutatorError::AmbiguousRollbackTarget)
        ));
    }
}
