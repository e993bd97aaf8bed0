use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use pricing_store::db::connection::build_pool;
use pricing_store::db::migrate;
use pricing_store::memory_store::InMemoryStore;
use pricing_store::sqlite_store::SqliteStore;
use pricing_store::store::DocumentStore;

#[derive(Parser)]
#[command(version, about = "Dynamic pricing core CLI")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    Scrape(ScrapeCmd),
    Scheduler(SchedulerCmd),
    Rate(RateCmd),
    Quote(QuoteCmd),
}

#[derive(Args)]
struct ScrapeCmd {
    #[command(subcommand)]
    sub: ScrapeSub,
}

#[derive(Subcommand)]
enum ScrapeSub {
    /// Runs one full-grid scrape immediately, outside the scheduler.
    Run,
    /// Runs one lite-refresh pass immediately.
    RunLite,
}

#[derive(Args)]
struct SchedulerCmd {
    #[command(subcommand)]
    sub: SchedulerSub,
}

#[derive(Subcommand)]
enum SchedulerSub {
    /// Starts the cron supervisor and blocks until interrupted.
    Start,
    /// Prints the most recent run of every job, per the audit log.
    Status,
}

#[derive(Args)]
struct RateCmd {
    #[command(subcommand)]
    sub: RateSub,
}

#[derive(Subcommand)]
enum RateSub {
    /// Applies a new base daily rate to a vehicle, per the atomic mutator.
    Apply {
        #[arg(long)]
        vehicle_id: String,
        #[arg(long)]
        new_rate: f64,
        #[arg(long, default_value = "manual")]
        reason: String,
        #[arg(long, default_value = "cli:operator")]
        triggered_by: String,
    },
    /// Rolls a vehicle's rate back to a prior value.
    Rollback {
        #[arg(long)]
        vehicle_id: String,
        #[arg(long)]
        history_id: Option<String>,
        #[arg(long)]
        target_rate: Option<f64>,
    },
}

#[derive(Args)]
struct QuoteCmd {
    #[arg(long)]
    branch_key: String,
    #[arg(long)]
    vehicle_id: String,
    #[arg(long)]
    class_bucket: String,
    #[arg(long)]
    base_daily_rate: f64,
    #[arg(long)]
    pickup_days_from_now: i64,
    #[arg(long)]
    duration_days: i64,
}

async fn open_store() -> Result<Arc<dyn DocumentStore>> {
    let config = pricing_shared::config::PricingConfig::from_env().context("loading PricingConfig")?;
    if config.use_mock_store {
        return Ok(Arc::new(InMemoryStore::new()));
    }
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required when USE_MOCK_STORE is unset")?;
    migrate::run_sqlite(&database_url).context("running pending migrations")?;
    let pool = build_pool(&database_url, 8).context("building sqlite pool")?;
    Ok(Arc::new(SqliteStore::new(pool)))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Scrape(ScrapeCmd { sub }) => {
            let store = open_store().await?;
            let fetcher: Arc<dyn pricing_scraper::providers::PageFetcher> = Arc::new(pricing_scraper::providers::ReqwestPageFetcher::default());
            let now = Utc::now();
            let branches = pricing_scheduler::BranchCache::empty();
            match sub {
                ScrapeSub::Run => pricing_scheduler::run_full_grid_scrape(store.as_ref(), &branches, fetcher, now).await?,
                ScrapeSub::RunLite => pricing_scheduler::run_lite_refresh(store.as_ref(), &branches, fetcher, now).await?,
            }
        }
        Cmd::Scheduler(SchedulerCmd { sub }) => match sub {
            SchedulerSub::Start => {
                let store = open_store().await?;
                let fetcher: Arc<dyn pricing_scraper::providers::PageFetcher> = Arc::new(pricing_scraper::providers::ReqwestPageFetcher::default());
                let config = pricing_shared::config::PricingConfig::from_env().context("loading PricingConfig")?;
                let mut scheduler = pricing_scheduler::supervisor::start(store, fetcher, &config).await?;
                tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
                scheduler.shutdown().await?;
            }
            SchedulerSub::Status => {
                let store = open_store().await?;
                let docs = store.query(pricing_scheduler::run_log::SCHEDULED_JOB_LOGS).await?;
                let mut latest: std::collections::HashMap<String, pricing_store::Document> = std::collections::HashMap::new();
                for doc in docs {
                    let job_name = doc.body.get("job_name").and_then(|v| v.as_str()).unwrap_or("unknown").to_string();
                    match latest.get(&job_name) {
                        Some(existing) if existing.updated_at >= doc.updated_at => {}
                        _ => {
                            latest.insert(job_name, doc);
                        }
                    }
                }
                for (job_name, doc) in latest {
                    println!("{job_name}: {}", serde_json::to_string(&doc.body)?);
                }
            }
        },
        Cmd::Rate(RateCmd { sub }) => {
            let store = open_store().await?;
            match sub {
                RateSub::Apply { vehicle_id, new_rate, reason, triggered_by } => {
                    let outcome = pricing_mutator::update_base_rate(
                        store.as_ref(),
                        &vehicle_id,
                        new_rate,
                        &reason,
                        &triggered_by,
                        serde_json::json!({}),
                        Utc::now(),
                    )
                    .await?;
                    println!("{}", serde_json::to_string_pretty(&outcome_to_json(&outcome))?);
                }
                RateSub::Rollback { vehicle_id, history_id, target_rate } => {
                    let target = pricing_mutator::RollbackTarget::from_options(history_id, target_rate)?;
                    let outcome = pricing_mutator::rollback(store.as_ref(), &vehicle_id, target, None, Utc::now()).await?;
                    println!("{}", serde_json::to_string_pretty(&outcome_to_json(&outcome))?);
                }
            }
        }
        Cmd::Quote(quote_cmd) => {
            let store = open_store().await?;
            let model: Arc<dyn pricing_engine::PricingModel> = Arc::new(pricing_engine::LinearPricingModel::default());
            let now = Utc::now();
            let ctx = pricing_engine::QuoteContext::new(store, model, now);
            let pickup_at = now + chrono::Duration::days(quote_cmd.pickup_days_from_now);
            let dropoff_at = pickup_at + chrono::Duration::days(quote_cmd.duration_days);
            let request = pricing_engine::QuoteRequest {
                branch_key: quote_cmd.branch_key,
                dropoff_branch_key: None,
                pickup_at,
                dropoff_at,
                vehicles: vec![pricing_engine::VehicleRequest {
                    vehicle_id: quote_cmd.vehicle_id,
                    class_bucket: quote_cmd.class_bucket,
                    base_daily_rate: quote_cmd.base_daily_rate,
                    cost_per_day: None,
                    branch_type: pricing_engine::BranchType::City,
                }],
                deadline: None,
            };
            let response = pricing_engine::quote(&ctx, &request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

fn outcome_to_json(outcome: &pricing_mutator::UpdateOutcome) -> serde_json::Value {
    serde_json::json!({
        "status": outcome.status,
        "vehicle_id": outcome.vehicle_id,
        "old_rate": outcome.old_rate,
        "new_rate": outcome.new_rate,
        "delta_amount": outcome.delta_amount,
        "delta_percent": outcome.delta_percent,
        "history_id": outcome.history_id,
    })
}
