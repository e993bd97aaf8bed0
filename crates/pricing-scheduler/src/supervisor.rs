//! Builds the cron schedule for the three periodic jobs from
//! [`pricing_shared::config::PricingConfig`] and drives them through
//! [`tokio_cron_scheduler::JobScheduler`].

use std::sync::Arc;

use pricing_scraper::providers::PageFetcher;
use pricing_shared::config::PricingConfig;
use pricing_store::store::DocumentStore;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::error;

use crate::branch_cache::BranchCache;
use crate::jobs::{run_cleanup, run_full_grid_scrape, run_lite_refresh};

/// Starts a [`JobScheduler`] with the full-grid scrape, lite-refresh, and
/// cleanup jobs registered per `config`, and returns it running. Callers own
/// the returned handle and are responsible for shutting it down. Both scrape
/// jobs share one process-wide [`BranchCache`], loaded from `store` on first
/// use and never re-queried unless something calls `reload` explicitly.
pub async fn start(
    store: Arc<dyn DocumentStore>,
    fetcher: Arc<dyn PageFetcher>,
    config: &PricingConfig,
) -> Result<JobScheduler, tokio_cron_scheduler::JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    let branches = Arc::new(BranchCache::empty());

    let full_grid_cron = format!("0 {} {} * * *", config.scrape_minute, config.scrape_hour);
    let full_grid_store = store.clone();
    let full_grid_fetcher = fetcher.clone();
    let full_grid_branches = branches.clone();
    scheduler
        .add(Job::new_async(full_grid_cron.as_str(), move |_uuid, _sched| {
            let store = full_grid_store.clone();
            let fetcher = full_grid_fetcher.clone();
            let branches = full_grid_branches.clone();
            Box::pin(async move {
                if let Err(err) = run_full_grid_scrape(store.as_ref(), branches.as_ref(), fetcher, chrono::Utc::now()).await {
                    error!(?err, "full-grid scrape job failed");
                }
            })
        })?)
        .await?;

    let lite_refresh_cron = format!("0 0 */{} * * *", config.lite_refresh_interval_hours.max(1));
    let lite_store = store.clone();
    let lite_fetcher = fetcher.clone();
    let lite_branches = branches.clone();
    scheduler
        .add(Job::new_async(lite_refresh_cron.as_str(), move |_uuid, _sched| {
            let store = lite_store.clone();
            let fetcher = lite_fetcher.clone();
            let branches = lite_branches.clone();
            Box::pin(async move {
                if let Err(err) = run_lite_refresh(store.as_ref(), branches.as_ref(), fetcher, chrono::Utc::now()).await {
                    error!(?err, "lite-refresh job failed");
                }
            })
        })?)
        .await?;

    let cleanup_store = store.clone();
    scheduler
        .add(Job::new_async("0 30 2 * * *", move |_uuid, _sched| {
            let store = cleanup_store.clone();
            Box::pin(async move {
                if let Err(err) = run_cleanup(store.as_ref(), chrono::Utc::now()).await {
                    error!(?err, "cleanup job failed");
                }
            })
        })?)
        .await?;

    scheduler.start().await?;
    Ok(scheduler)
}
