//! The pricing decision record: one immutable audit document per priced
//! vehicle, per spec §3.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use pricing_store::document::{to_body, Document};
use pricing_store::store::DocumentStore;
use serde::{Deserialize, Serialize};

pub const PRICING_DECISIONS: &str = "pricing_decisions";

/// One priced-vehicle audit record. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingDecision {
    pub vehicle_id: String,
    pub branch_key: String,
    pub class_bucket: String,
    pub duration_days: i64,
    pub duration_key: String,
    pub features: [f64; 10],
    pub market_stats_available: bool,
    pub cost_per_day: Option<f64>,
    pub ml_price: f64,
    pub rule_price: f64,
    pub blended_price: f64,
    pub floor: f64,
    pub ceiling: f64,
    pub final_price_per_day: f64,
    pub total_price: f64,
    pub discounts_applied: Vec<String>,
    pub premiums_applied: Vec<String>,
    pub model_version: String,
    pub cache_hit: bool,
    pub created_at: DateTime<Utc>,
}

/// Writes `decision` to the `pricing_decisions` collection under a freshly
/// generated id.
pub async fn record_decision(
    store: &dyn DocumentStore,
    decision: &PricingDecision,
) -> Result<(), pricing_store::StoreError> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = decision.created_at;
    let body = to_body(decision)?;
    store
        .put(Document { collection: PRICING_DECISIONS.to_string(), id, body, created_at: now, updated_at: now })
        .await
}

/// Breakdown keyed for the client-facing response, flattened from a
/// decision's floor/ceiling/blend intermediates.
pub fn breakdown_map(decision: &PricingDecision) -> HashMap<String, f64> {
    let mut map = HashMap::new();
    map.insert("ml_price".to_string(), decision.ml_price);
    map.insert("rule_price".to_string(), decision.rule_price);
    map.insert("blended_price".to_string(), decision.blended_price);
    map.insert("floor".to_string(), decision.floor);
    map.insert("ceiling".to_string(), decision.ceiling);
    map.insert("final_price_per_day".to_string(), decision.final_price_per_day);
    map
}
