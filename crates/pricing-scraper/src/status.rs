//! Per-provider status tracking, persisted in the `provider_status` collection.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const STALE_AFTER: Duration = Duration::hours(2);

/// A provider's running health record, read before/written after each run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_duration_ms: u64,
    pub last_offer_count: u32,
    pub disabled_this_run: bool,
}

impl Default for ProviderStatus {
    fn default() -> Self {
        Self {
            last_run_at: None,
            last_success_at: None,
            last_error: None,
            last_duration_ms: 0,
            last_offer_count: 0,
            disabled_this_run: false,
        }
    }
}

impl ProviderStatus {
    /// True when `last_success_at` is unset or older than two hours as of `now`.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.last_success_at {
            Some(ts) => now - ts > STALE_AFTER,
            None => true,
        }
    }

    /// Records a successful run.
    pub fn record_success(&mut self, now: DateTime<Utc>, duration_ms: u64, offer_count: u32) {
        self.last_run_at = Some(now);
        self.last_success_at = Some(now);
        self.last_error = None;
        self.last_duration_ms = duration_ms;
        self.last_offer_count = offer_count;
        self.disabled_this_run = false;
    }

    /// Records a run that errored without a DNS/404 terminal signal.
    /// `last_success_at` is left untouched.
    pub fn record_error(&mut self, now: DateTime<Utc>, duration_ms: u64, error: impl Into<String>) {
        self.last_run_at = Some(now);
        self.last_error = Some(error.into());
        self.last_duration_ms = duration_ms;
        self.disabled_this_run = false;
    }

    /// Records a terminal validation failure (DNS/404) without touching
    /// `last_success_at`, per the disabled-for-this-run contract.
    pub fn record_disabled(&mut self, now: DateTime<Utc>, reason: impl Into<String>) {
        self.last_run_at = Some(now);
        self.last_error = Some(reason.into());
        self.disabled_this_run = true;
    }
}
