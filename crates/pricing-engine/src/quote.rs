//! Per-vehicle quote orchestration: cache check, market read, feature
//! assembly, model/rule blend, guardrails, clamp & round, fan-out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use pricing_shared::money::{clip_profit_first, round_to_step_in_band};
use pricing_shared::time::{day_of_week_index, duration_days, is_weekend, DurationKey};
use pricing_store::store::DocumentStore;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;
use uuid::Uuid;

use crate::cache::{cache_id, read_cache, write_cache};
use crate::decision::{breakdown_map, record_decision, PricingDecision};
use crate::errors::EngineError;
use crate::model::PricingModel;

const DEFAULT_CACHE_TTL_MINUTES: i64 = 30;
const DEFAULT_WORKER_POOL_SIZE: usize = 8;
const BRANCHES: &str = "branches";

/// A branch's operating mode, relevant to the local blend's airport premium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchType {
    City,
    Airport,
}

/// One vehicle in a quote request, per spec §6.
#[derive(Debug, Clone)]
pub struct VehicleRequest {
    pub vehicle_id: String,
    pub class_bucket: String,
    pub base_daily_rate: f64,
    pub cost_per_day: Option<f64>,
    pub branch_type: BranchType,
}

/// A whole `POST /quote` request.
#[derive(Debug, Clone)]
pub struct QuoteRequest {
    pub branch_key: String,
    pub dropoff_branch_key: Option<String>,
    pub pickup_at: DateTime<Utc>,
    pub dropoff_at: DateTime<Utc>,
    pub vehicles: Vec<VehicleRequest>,
    /// Caller-supplied deadline; per-vehicle pricing falls back to a
    /// base-rate breakdown if it fires before that vehicle completes.
    pub deadline: Option<StdDuration>,
}

/// One priced vehicle in the response.
#[derive(Debug, Clone, Serialize)]
pub struct VehicleQuote {
    pub vehicle_id: String,
    pub daily_price: f64,
    pub total_price: f64,
    pub breakdown: HashMap<String, f64>,
    pub cached: bool,
}

/// The full `quote()` response, per spec §4.6.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteResponse {
    pub quote_id: String,
    pub duration_days: i64,
    pub duration_key: &'static str,
    pub vehicles: Vec<VehicleQuote>,
    pub market_stats_available: bool,
    pub timestamp: DateTime<Utc>,
    pub is_one_way: bool,
    pub one_way_premium: Option<f64>,
}

/// Runtime collaborators `quote()` needs beyond the request itself. Held
/// behind `Arc` so per-vehicle pricing tasks can be fanned out onto the
/// worker pool without borrowing from the caller's stack frame.
#[derive(Clone)]
pub struct QuoteContext {
    pub store: Arc<dyn DocumentStore>,
    pub model: Arc<dyn PricingModel>,
    pub now: DateTime<Utc>,
    pub cache_ttl_minutes: i64,
    pub worker_pool_size: usize,
}

impl QuoteContext {
    pub fn new(store: Arc<dyn DocumentStore>, model: Arc<dyn PricingModel>, now: DateTime<Utc>) -> Self {
        Self { store, model, now, cache_ttl_minutes: DEFAULT_CACHE_TTL_MINUTES, worker_pool_size: DEFAULT_WORKER_POOL_SIZE }
    }
}

/// Prices every vehicle in `request`, fanning out across a bounded worker
/// pool. Per-vehicle failures never fail the whole quote: a vehicle whose
/// pricing path errors or times out falls back to `base_daily_rate *
/// duration_days` with an `"error"` breakdown entry.
pub async fn quote(ctx: &QuoteContext, request: &QuoteRequest) -> Result<QuoteResponse, EngineError> {
    if request.vehicles.is_empty() {
        return Err(EngineError::EmptyRequest);
    }

    let duration_days_count = duration_days(request.pickup_at, request.dropoff_at).max(1);
    let duration_key = DurationKey::from_days(duration_days_count);

    let market_available_classes = collect_unique_classes(&request.vehicles);
    let mut market_by_class = HashMap::new();
    for class_bucket in &market_available_classes {
        let aggregate = pricing_aggregator::read_aggregate(ctx.store.as_ref(), &request.branch_key, class_bucket, ctx.now)
            .await
            .map_err(EngineError::Store)?;
        market_by_class.insert(class_bucket.clone(), aggregate);
    }
    let market_stats_available = market_by_class.values().any(|a| a.as_ref().is_some_and(|a| a.count > 0));

    let is_one_way = resolve_is_one_way(ctx.store.as_ref(), &request.branch_key, request.dropoff_branch_key.as_deref())
        .await
        .map_err(EngineError::Store)?;
    let one_way_premium = if is_one_way { Some(1.15) } else { None };

    let semaphore = Arc::new(Semaphore::new(ctx.worker_pool_size.max(1)));
    let mut tasks = JoinSet::new();

    for vehicle in request.vehicles.clone() {
        let market = market_by_class.get(&vehicle.class_bucket).cloned().flatten();
        let permit = Arc::clone(&semaphore);
        let pickup_at = request.pickup_at;
        let branch_key = request.branch_key.clone();
        let now = ctx.now;
        let deadline = request.deadline;
        let cache_ttl_minutes = ctx.cache_ttl_minutes;

        let demand_index =
            read_demand_index_or_fallback(ctx.store.as_ref(), &branch_key, &vehicle.class_bucket, now, pickup_at)
                .await
                .map_err(EngineError::Store)?;

        let id = cache_id(&branch_key, &vehicle.vehicle_id, pickup_at.date_naive(), duration_key.as_str());
        let cached_entry = read_cache(ctx.store.as_ref(), &id, now).await.map_err(EngineError::Store)?;

        if let Some(entry) = cached_entry {
            tasks.spawn(async move {
                let _permit = permit.acquire_owned().await;
                VehicleQuote {
                    vehicle_id: vehicle.vehicle_id,
                    daily_price: entry.final_price_per_day,
                    total_price: entry.total_price,
                    breakdown: entry.breakdown,
                    cached: true,
                }
            });
            continue;
        }

        let store = Arc::clone(&ctx.store);
        let model = Arc::clone(&ctx.model);

        tasks.spawn(async move {
            let _permit = permit.acquire_owned().await;
            let fut = price_one_vehicle(
                store.as_ref(),
                model.as_ref(),
                &vehicle,
                &branch_key,
                pickup_at,
                duration_days_count,
                duration_key,
                market,
                demand_index,
                now,
                &id,
                cache_ttl_minutes,
            );
            match deadline {
                Some(d) => match tokio::time::timeout(d, fut).await {
                    Ok(q) => q,
                    Err(_) => fallback_quote(&vehicle, duration_days_count, "deadline exceeded"),
                },
                None => fut.await,
            }
        });
    }

    let mut vehicles = Vec::with_capacity(request.vehicles.len());
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(mut q) => {
                if is_one_way {
                    apply_one_way_premium(&mut q, duration_days_count);
                }
                vehicles.push(q);
            }
            Err(e) => warn!(error = %e, "vehicle pricing task panicked"),
        }
    }
    vehicles.sort_by(|a, b| a.vehicle_id.cmp(&b.vehicle_id));

    Ok(QuoteResponse {
        quote_id: Uuid::new_v4().to_string(),
        duration_days: duration_days_count,
        duration_key: duration_key.as_str(),
        vehicles,
        market_stats_available,
        timestamp: ctx.now,
        is_one_way,
        one_way_premium,
    })
}

#[allow(clippy::too_many_arguments)]
async fn price_one_vehicle(
    store: &dyn DocumentStore,
    model: &dyn PricingModel,
    vehicle: &VehicleRequest,
    branch_key: &str,
    pickup_at: DateTime<Utc>,
    duration_days_count: i64,
    duration_key: DurationKey,
    market: Option<pricing_aggregator::CompetitorAggregate>,
    demand_index: f64,
    now: DateTime<Utc>,
    cache_key: &str,
    cache_ttl_minutes: i64,
) -> VehicleQuote {
    let avg_competitor_price = market.as_ref().filter(|m| m.count > 0).map(|m| m.median).unwrap_or(vehicle.base_daily_rate);

    let features: [f64; 10] = [
        duration_days_count as f64,
        day_of_week_index(pickup_at) as f64,
        pickup_at.format("%m").to_string().parse().unwrap_or(1.0),
        vehicle.base_daily_rate,
        25.0,
        0.0,
        10.0,
        avg_competitor_price,
        demand_index,
        1.0,
    ];

    let ml_price = match model.predict(&features) {
        Ok(p) => p,
        Err(e) => {
            warn!(vehicle_id = %vehicle.vehicle_id, error = %e, "pricing model unavailable, falling back");
            return fallback_quote(vehicle, duration_days_count, "model unavailable");
        }
    };

    let rule_price = local_rule_price(vehicle, duration_key, pickup_at);
    let blended = 0.6 * rule_price + 0.4 * ml_price;

    let cost_floor = match vehicle.cost_per_day.filter(|&c| c > 0.0) {
        Some(cost) => cost * 1.15,
        None => vehicle.base_daily_rate * 0.70,
    };

    let (floor, ceiling) = match market.as_ref().filter(|m| m.count > 0) {
        Some(m) => {
            let market_ref = m.median;
            (cost_floor.max(market_ref * 0.85), market_ref * 1.10)
        }
        None => (cost_floor.max(vehicle.base_daily_rate * 0.80), vehicle.base_daily_rate * 1.10),
    };
    let (clamped, floor, ceiling) = clip_profit_first(blended, floor, ceiling);

    let final_price_per_day = round_to_step_in_band(clamped, floor, ceiling);
    let total_price = final_price_per_day * duration_days_count as f64;

    let decision = PricingDecision {
        vehicle_id: vehicle.vehicle_id.clone(),
        branch_key: branch_key.to_string(),
        class_bucket: vehicle.class_bucket.clone(),
        duration_days: duration_days_count,
        duration_key: duration_key.as_str().to_string(),
        features,
        market_stats_available: market.is_some(),
        cost_per_day: vehicle.cost_per_day,
        ml_price,
        rule_price,
        blended_price: blended,
        floor,
        ceiling,
        final_price_per_day,
        total_price,
        discounts_applied: Vec::new(),
        premiums_applied: Vec::new(),
        model_version: model.version().to_string(),
        cache_hit: false,
        created_at: now,
    };
    let breakdown = breakdown_map(&decision);

    if let Err(e) = record_decision(store, &decision).await {
        warn!(vehicle_id = %vehicle.vehicle_id, error = %e, "failed to record pricing decision");
    }
    if let Err(e) = write_cache(
        store,
        cache_key,
        final_price_per_day,
        total_price,
        breakdown.clone(),
        now,
        Duration::minutes(cache_ttl_minutes),
    )
    .await
    {
        warn!(vehicle_id = %vehicle.vehicle_id, error = %e, "failed to write quote cache entry");
    }

    VehicleQuote { vehicle_id: vehicle.vehicle_id.clone(), daily_price: final_price_per_day, total_price, breakdown, cached: false }
}

/// The engine's own shorter rule path (spec §4.6): base rate, duration
/// discount, airport premium, weekend premium. Distinct from the full
/// multi-factor engine in `pricing-rules`, which this component does not
/// call on the hot quote path.
fn local_rule_price(vehicle: &VehicleRequest, duration_key: DurationKey, pickup_at: DateTime<Utc>) -> f64 {
    let mut price = vehicle.base_daily_rate;
    price *= match duration_key {
        DurationKey::D1 => 1.0,
        DurationKey::D3 => 0.97,
        DurationKey::D7 => 0.93,
        DurationKey::M1 => 0.85,
    };
    if vehicle.branch_type == BranchType::Airport {
        price *= 1.05;
    }
    if is_weekend(pickup_at) {
        price *= 1.03;
    }
    price
}

fn fallback_quote(vehicle: &VehicleRequest, duration_days_count: i64, reason: &str) -> VehicleQuote {
    warn!(vehicle_id = %vehicle.vehicle_id, reason, "vehicle priced via fallback path");
    let total = vehicle.base_daily_rate * duration_days_count as f64;
    let mut breakdown = HashMap::new();
    breakdown.insert("error".to_string(), 1.0);
    VehicleQuote {
        vehicle_id: vehicle.vehicle_id.clone(),
        daily_price: vehicle.base_daily_rate,
        total_price: total,
        breakdown,
        cached: false,
    }
}

fn apply_one_way_premium(quote: &mut VehicleQuote, duration_days_count: i64) {
    quote.daily_price = pricing_shared::money::round2(quote.daily_price * 1.15);
    quote.total_price = quote.daily_price * duration_days_count as f64;
    quote.breakdown.insert("one_way_premium".to_string(), 1.15);
}

fn collect_unique_classes(vehicles: &[VehicleRequest]) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    for v in vehicles {
        seen.insert(v.class_bucket.clone());
    }
    seen.into_iter().collect()
}

async fn resolve_is_one_way(
    store: &dyn DocumentStore,
    branch_key: &str,
    dropoff_branch_key: Option<&str>,
) -> Result<bool, pricing_store::StoreError> {
    let Some(dropoff_key) = dropoff_branch_key else { return Ok(false) };
    if dropoff_key == branch_key {
        return Ok(false);
    }
    let pickup_city = branch_city(store, branch_key).await?;
    let dropoff_city = branch_city(store, dropoff_key).await?;
    match (pickup_city, dropoff_city) {
        (Some(a), Some(b)) => Ok(a != b),
        // Unknown branch config: treat differing keys as one-way to be safe.
        _ => Ok(true),
    }
}

async fn branch_city(store: &dyn DocumentStore, branch_key: &str) -> Result<Option<String>, pricing_store::StoreError> {
    let branches = store.query(BRANCHES).await?;
    Ok(branches
        .iter()
        .find(|b| b.body.get("branch_key").and_then(|v| v.as_str()) == Some(branch_key))
        .and_then(|b| b.body.get("city").and_then(|v| v.as_str()).map(str::to_string)))
}

async fn read_demand_index_or_fallback(
    store: &dyn DocumentStore,
    branch_key: &str,
    class_bucket: &str,
    now: DateTime<Utc>,
    pickup_at: DateTime<Utc>,
) -> Result<f64, pricing_store::StoreError> {
    match pricing_signals::read_demand_signal(store, branch_key, class_bucket, now).await? {
        Some(signal) => Ok(signal.demand_index),
        None => Ok(pricing_signals::fallback_demand_index(now, pickup_at)),
    }
}
