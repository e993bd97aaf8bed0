//! Drives the scrape grid: fan-out over `(provider, branch, date, duration,
//! time)` cells, dedup, and status bookkeeping.

use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use pricing_store::document::Document;
use pricing_store::store::{BatchOp, DocumentStore};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::grid::{ScrapeGrid, build_grid};
use crate::offer::{CompetitorOffer, offer_hash};
use crate::providers::parse::{normalize_class, normalize_price, parse};
use crate::providers::{FetchError, PageFetcher, Provider};
use crate::status::ProviderStatus;

const DEDUP_WINDOW: ChronoDuration = ChronoDuration::hours(6);
const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_SECS: u64 = 2;
const DEBUG_HTML_PREVIEW_BYTES: usize = 12 * 1024;
const BATCH_SIZE: usize = 500;

const COMPETITOR_PRICES: &str = "competitor_prices";
const PROVIDER_STATUS: &str = "provider_status";
const SCRAPE_DEBUG: &str = "scrape_debug";

/// A branch the grid is walked against; a thin projection of the branch
/// configuration entity (spec §3) down to what the orchestrator needs.
#[derive(Debug, Clone)]
pub struct BranchTarget {
    pub branch_key: String,
    pub city: String,
}

/// One `(provider, branch, url)` fetch cell.
struct Cell<'a> {
    provider: Provider,
    branch: &'a BranchTarget,
    url: String,
}

/// Summary returned after a full scrape run, per spec §4.2.
#[derive(Debug, Default, serde::Serialize)]
pub struct ScrapeSummary {
    pub total_offers: u32,
    pub total_new: u32,
    pub providers_scraped: u32,
    pub errors: Vec<String>,
}

/// Runs one scrape over `branches` in `mode`, using `fetcher` for page
/// fetches and `store` for dedup reads and snapshot writes.
///
/// Providers within a city run sequentially (politeness); cities run
/// sequentially; ordering across cells carries no semantics.
pub async fn run_scrape(
    store: &dyn DocumentStore,
    fetcher: Arc<dyn PageFetcher>,
    branches: &[BranchTarget],
    mode: pricing_shared::config::ScrapeMode,
    now: DateTime<Utc>,
) -> ScrapeSummary {
    let grid = build_grid(mode, now);
    let mut summary = ScrapeSummary::default();
    let mut providers_with_offers = std::collections::HashSet::new();

    let mut cities: Vec<&BranchTarget> = branches.iter().collect();
    cities.sort_by(|a, b| a.city.cmp(&b.city));

    for branch in cities {
        for provider in Provider::ALL {
            let cell_url = format!("https://{}.sa/{}", provider.key(), branch.branch_key);
            let cell = Cell { provider, branch, url: cell_url };

            match scrape_cell(store, fetcher.as_ref(), &cell, &grid, now).await {
                Ok(outcome) => {
                    summary.total_offers += outcome.offers_found;
                    summary.total_new += outcome.new_offers;
                    if outcome.offers_found > 0 {
                        providers_with_offers.insert(provider);
                    }
                    update_status(store, provider, now, outcome).await;
                }
                Err(e) => {
                    summary.errors.push(format!("{}/{}: {e}", provider.key(), branch.city));
                    update_status_error(store, provider, now, &e).await;
                }
            }

            tokio::time::sleep(StdDuration::from_secs(1)).await;
        }
    }

    summary.providers_scraped = providers_with_offers.len() as u32;
    info!(
        total_offers = summary.total_offers,
        total_new = summary.total_new,
        providers_scraped = summary.providers_scraped,
        "scrape run complete"
    );
    summary
}

struct CellOutcome {
    offers_found: u32,
    new_offers: u32,
    duration_ms: u64,
}

async fn scrape_cell(
    store: &dyn DocumentStore,
    fetcher: &dyn PageFetcher,
    cell: &Cell<'_>,
    grid: &ScrapeGrid,
    now: DateTime<Utc>,
) -> Result<CellOutcome, FetchError> {
    let started = Instant::now();
    let body = match fetch_with_retry(fetcher, cell.provider, &cell.url).await {
        Ok(body) => body,
        Err(e) => {
            save_debug_record(store, cell, &e, &[]).await;
            return Err(e);
        }
    };

    if looks_like_dead_link(&body) {
        let err = FetchError::DeadLink { provider: cell.provider, url: cell.url.clone() };
        save_debug_record(store, cell, &err, &body).await;
        return Err(err);
    }

    let raw_offers = parse(cell.provider, &body);
    let mut ops = Vec::new();
    let mut offers_found = 0u32;
    let mut new_offers = 0u32;
    // offer_hash excludes duration_days, so every duration in the grid maps
    // to the same hash for a given raw offer. Track hashes already queued in
    // this call's own batch so siblings don't land next to each other with
    // an identical hash before is_duplicate's store lookup would ever see them.
    let mut queued_hashes = std::collections::HashSet::new();

    for raw in &raw_offers {
        let Some(price) = normalize_price(&raw.price_text) else { continue };
        offers_found += 1;
        let class_bucket = normalize_class(&raw.raw_category, &raw.vehicle_name);

        for duration in &grid.durations {
            let hash = offer_hash(cell.provider, &cell.branch.branch_key, class_bucket, price);
            if !queued_hashes.insert(hash.clone()) {
                continue;
            }
            if is_duplicate(store, &hash, now).await {
                continue;
            }
            let offer = CompetitorOffer::new(
                cell.provider,
                &cell.branch.branch_key,
                class_bucket,
                &raw.vehicle_name,
                price,
                *duration,
                &raw.currency,
                now,
                &cell.url,
            );
            let body = pricing_store::document::to_body(&offer).unwrap_or(json!({}));
            ops.push(BatchOp::Put(Document {
                collection: COMPETITOR_PRICES.to_string(),
                id: Uuid::new_v4().to_string(),
                body,
                created_at: now,
                updated_at: now,
            }));
            new_offers += 1;
        }
    }

    for chunk in ops.chunks(BATCH_SIZE) {
        if let Err(e) = store.batch(chunk.to_vec()).await {
            warn!(error = %e, "failed to write competitor offer batch");
        }
    }

    let duration_ms = started.elapsed().as_millis() as u64;
    Ok(CellOutcome { offers_found, new_offers, duration_ms })
}

async fn fetch_with_retry(fetcher: &dyn PageFetcher, provider: Provider, url: &str) -> Result<Vec<u8>, FetchError> {
    tokio::time::sleep(crate::providers::initial_jitter()).await;
    let mut last_err = None;
    for attempt in 0..MAX_ATTEMPTS {
        match fetcher.fetch(provider, url).await {
            Ok(body) => return Ok(body),
            Err(e) => {
                last_err = Some(e);
                if attempt + 1 < MAX_ATTEMPTS {
                    let backoff = BACKOFF_BASE_SECS * 2u64.pow(attempt);
                    tokio::time::sleep(StdDuration::from_secs(backoff)).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or(FetchError::Timeout { url: url.to_string(), elapsed_ms: 0 }))
}

/// DNS/404-style terminal signal in a fetched body: no usable markup, so the
/// provider is marked disabled for this run rather than merely errored.
fn looks_like_dead_link(body: &[u8]) -> bool {
    let text = String::from_utf8_lossy(body);
    text.is_empty() || text.contains("404") || text.to_lowercase().contains("not found")
}

async fn is_duplicate(store: &dyn DocumentStore, hash: &str, now: DateTime<Utc>) -> bool {
    let cutoff = now - DEDUP_WINDOW;
    match store.query(COMPETITOR_PRICES).await {
        Ok(docs) => docs.iter().any(|d| {
            d.body.get("hash").and_then(|v| v.as_str()) == Some(hash) && d.created_at >= cutoff
        }),
        Err(_) => false,
    }
}

async fn save_debug_record(store: &dyn DocumentStore, cell: &Cell<'_>, error: &FetchError, body: &[u8]) {
    let preview: String = String::from_utf8_lossy(body).chars().take(DEBUG_HTML_PREVIEW_BYTES).collect();
    let record = json!({
        "provider": cell.provider.key(),
        "url": cell.url,
        "error": error.to_string(),
        "html_preview": preview,
    });
    let now = Utc::now();
    let _ = store
        .put(Document {
            collection: SCRAPE_DEBUG.to_string(),
            id: Uuid::new_v4().to_string(),
            body: record,
            created_at: now,
            updated_at: now,
        })
        .await;
}

async fn update_status(store: &dyn DocumentStore, provider: Provider, now: DateTime<Utc>, outcome: CellOutcome) {
    let mut status = load_status(store, provider).await;
    status.record_success(now, outcome.duration_ms, outcome.offers_found);
    write_status(store, provider, &status).await;
}

async fn update_status_error(store: &dyn DocumentStore, provider: Provider, now: DateTime<Utc>, error: &FetchError) {
    let mut status = load_status(store, provider).await;
    match error {
        FetchError::DeadLink { .. } => status.record_disabled(now, error.to_string()),
        _ => status.record_error(now, 0, error.to_string()),
    }
    write_status(store, provider, &status).await;
}

async fn load_status(store: &dyn DocumentStore, provider: Provider) -> ProviderStatus {
    store
        .get(PROVIDER_STATUS, provider.key())
        .await
        .ok()
        .flatten()
        .and_then(|doc| doc.into_typed().ok())
        .unwrap_or_default()
}

async fn write_status(store: &dyn DocumentStore, provider: Provider, status: &ProviderStatus) {
    let now = Utc::now();
    let body = pricing_store::document::to_body(status).unwrap_or(json!({}));
    let _ = store
        .put(Document {
            collection: PROVIDER_STATUS.to_string(),
            id: provider.key().to_string(),
            body,
            created_at: now,
            updated_at: now,
        })
        .await;
}
