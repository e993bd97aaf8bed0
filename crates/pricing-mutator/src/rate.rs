//! `update_base_rate`: the only path allowed to change a vehicle's
//! `base_daily_rate`, per spec §3's ownership rule.

use chrono::{DateTime, Utc};
use pricing_store::document::to_body;
use pricing_store::error::StoreError;
use pricing_store::store::{DocumentStore, Tx, TxBody};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::MutatorError;

pub const VEHICLES: &str = "vehicles";
pub const VEHICLE_HISTORY: &str = "vehicle_history";

/// Result of [`update_base_rate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub status: String,
    pub vehicle_id: String,
    pub old_rate: f64,
    pub new_rate: f64,
    pub delta_amount: f64,
    pub delta_percent: Option<f64>,
    pub history_id: Option<String>,
}

/// Transactionally moves `vehicle_id`'s `base_daily_rate` to `new_rate`,
/// appending a [`VEHICLE_HISTORY`] record. Both writes commit atomically; a
/// store conflict re-runs the whole body.
pub async fn update_base_rate(
    store: &dyn DocumentStore,
    vehicle_id: &str,
    new_rate: f64,
    reason: &str,
    triggered_by: &str,
    context: Value,
    now: DateTime<Utc>,
) -> Result<UpdateOutcome, MutatorError> {
    if new_rate <= 0.0 {
        return Err(MutatorError::Validation("new_rate must be greater than zero".to_string()));
    }

    let vehicle_id = vehicle_id.to_string();
    let reason = reason.to_string();
    let triggered_by = triggered_by.to_string();

    let body: TxBody = Box::new(move |tx: &mut dyn Tx| run_update(tx, &vehicle_id, new_rate, &reason, &triggered_by, &context, now));

    let value = store.transaction(5, body).await.map_err(map_transaction_error)?;
    serde_json::from_value(value).map_err(|source| {
        MutatorError::Store(StoreError::Malformed { collection: VEHICLES.to_string(), id: String::new(), source })
    })
}

fn run_update(
    tx: &mut dyn Tx,
    vehicle_id: &str,
    new_rate: f64,
    reason: &str,
    triggered_by: &str,
    context: &Value,
    now: DateTime<Utc>,
) -> Result<Value, StoreError> {
    let Some(doc) = tx.get(VEHICLES, vehicle_id)? else {
        return Err(StoreError::NotFound { collection: VEHICLES.to_string(), id: vehicle_id.to_string() });
    };

    let old_rate = doc.body.get("base_daily_rate").and_then(|v| v.as_f64()).unwrap_or(0.0);
    let cost_per_day = doc.body.get("cost_per_day").and_then(|v| v.as_f64());

    if let Some(cost) = cost_per_day.filter(|&c| c > 0.0) {
        if new_rate < cost {
            return Err(StoreError::Aborted(format!(
                "new_rate {new_rate} is below cost_per_day {cost} for vehicle {vehicle_id}"
            )));
        }
    }

    if (old_rate - new_rate).abs() < 1e-9 {
        return to_body(&UpdateOutcome {
            status: "no_change".to_string(),
            vehicle_id: vehicle_id.to_string(),
            old_rate,
            new_rate,
            delta_amount: 0.0,
            delta_percent: Some(0.0),
            history_id: None,
        });
    }

    let delta_amount = new_rate - old_rate;
    let delta_percent = if old_rate > 0.0 { Some(delta_amount / old_rate) } else { None };

    let history_id = uuid::Uuid::new_v4().to_string();
    let history_body = json!({
        "vehicle_id": vehicle_id,
        "change_type": "base_rate_update",
        "old_base_daily_rate": old_rate,
        "new_base_daily_rate": new_rate,
        "delta_amount": delta_amount,
        "delta_percent": delta_percent,
        "reason": reason,
        "triggered_by": triggered_by,
        "request_context": context,
    });
    tx.put(pricing_store::document::Document {
        collection: VEHICLE_HISTORY.to_string(),
        id: history_id.clone(),
        body: history_body,
        created_at: now,
        updated_at: now,
    })?;

    tx.patch(VEHICLES, vehicle_id, json!({ "base_daily_rate": new_rate, "updated_at": now }))?;

    to_body(&UpdateOutcome {
        status: "applied".to_string(),
        vehicle_id: vehicle_id.to_string(),
        old_rate,
        new_rate,
        delta_amount,
        delta_percent,
        history_id: Some(history_id),
    })
}

fn map_transaction_error(err: StoreError) -> MutatorError {
    match err {
        StoreError::Aborted(msg) => MutatorError::Validation(msg),
        other => MutatorError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricing_store::memory_store::InMemoryStore;
    use pricing_store::Document;

    async fn seed_vehicle(store: &InMemoryStore, base_rate: f64, cost: f64) {
        let now = Utc::now();
        store
            .put(Document {
                collection: VEHICLES.to_string(),
                id: "veh-1".to_string(),
                body: json!({"base_daily_rate": base_rate, "cost_per_day": cost}),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn applies_rate_change_and_writes_history() {
        let store = InMemoryStore::new();
        seed_vehicle(&store, 150.0, 100.0).await;
        let now = Utc::now();
        let outcome = update_base_rate(&store, "veh-1", 160.0, "manual", "operator:alice", json!({}), now).await.unwrap();
        assert_eq!(outcome.status, "applied");
        assert_eq!(outcome.old_rate, 150.0);
        assert!(outcome.history_id.is_some());

        let history = store.query(VEHICLE_HISTORY).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].body["new_base_daily_rate"], 160.0);

        let vehicle = store.get(VEHICLES, "veh-1").await.unwrap().unwrap();
        assert_eq!(vehicle.body["base_daily_rate"], 160.0);
    }

    #[tokio::test]
    async fn same_rate_is_a_no_change_with_no_history_write() {
        let store = InMemoryStore::new();
        seed_vehicle(&store, 150.0, 100.0).await;
        let outcome = update_base_rate(&store, "veh-1", 150.0, "manual", "operator:alice", json!({}), Utc::now()).await.unwrap();
        assert_eq!(outcome.status, "no_change");
        assert!(store.query(VEHICLE_HISTORY).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn below_cost_floor_is_rejected_without_writing() {
        let store = InMemoryStore::new();
        seed_vehicle(&store, 150.0, 100.0).await;
        let result = update_base_rate(&store, "veh-1", 80.0, "manual", "operator:alice", json!({}), Utc::now()).await;
        assert!(matches!(result, Err(MutatorError::Validation(_))));
        assert!(store.query(VEHICLE_HISTORY).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_vehicle_is_not_found() {
        let store = InMemoryStore::new();
        let result = update_base_rate(&store, "missing", 100.0, "manual", "operator:alice", json!({}), Utc::now()).await;
        assert!(matches!(result, Err(MutatorError::Store(StoreError::NotFound { .. }))));
    }
}
