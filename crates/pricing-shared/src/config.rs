//! Process-wide configuration, loaded once from environment variables.
//!
//! Mirrors the variables enumerated in the pricing core's external
//! interfaces: scrape mode/schedule, lite-refresh cadence, quote cache
//! policy, and the mock-store switch used for local development and tests.

use thiserror::Error;

use crate::env::{EnvError, get_env_bool, get_env_u64, get_env_var, get_env_var_opt};

/// Errors surfaced while assembling [`PricingConfig`] from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: String, reason: String },
}

impl From<EnvError> for ConfigError {
    fn from(e: EnvError) -> Self {
        match e {
            EnvError::Missing(name) => ConfigError::MissingEnvVar(name),
            EnvError::Invalid { name, reason, .. } => ConfigError::Invalid { name, reason },
        }
    }
}

/// Which scrape grid the orchestrator should walk on its full run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeMode {
    /// A small grid (one pickup date, two durations) used for frequent checks.
    FastGrid,
    /// The full grid over dates/durations/times described in spec §4.2.
    FullGrid,
    /// Airport-only subset, used for the lite-refresh job.
    AirportQuote,
}

impl ScrapeMode {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_uppercase().as_str() {
            "FAST_GRID" => Ok(ScrapeMode::FastGrid),
            "FULL_GRID" => Ok(ScrapeMode::FullGrid),
            "AIRPORT_QUOTE" => Ok(ScrapeMode::AirportQuote),
            other => Err(ConfigError::Invalid {
                name: "SCRAPE_MODE".to_string(),
                reason: format!("unrecognized scrape mode {other:?}"),
            }),
        }
    }
}

/// Process-wide configuration for the pricing core.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// Use the in-memory mock store instead of a real SQLite-backed one.
    pub use_mock_store: bool,
    /// Grid to walk on the daily full-grid scrape job.
    pub scrape_mode: ScrapeMode,
    /// Whether the lite-refresh job is scheduled at all.
    pub lite_refresh_enabled: bool,
    /// Interval, in hours, between lite-refresh runs.
    pub lite_refresh_interval_hours: u64,
    /// Local hour (0-23) at which the daily full-grid scrape fires.
    pub scrape_hour: u32,
    /// Local minute (0-59) at which the daily full-grid scrape fires.
    pub scrape_minute: u32,
    /// Whether the quote cache is consulted/written at all.
    pub pricing_cache_enabled: bool,
    /// TTL, in minutes, for quote cache entries.
    pub pricing_cache_ttl_minutes: u64,
    /// Shared secret gating operator-only endpoints; `None` when unset.
    pub cron_secret: Option<String>,
}

impl PricingConfig {
    /// Loads configuration from the environment, applying the documented
    /// defaults for every optional variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let use_mock_store = get_env_bool("USE_MOCK_STORE", false);

        let scrape_mode = match get_env_var_opt("SCRAPE_MODE") {
            Some(raw) => ScrapeMode::parse(&raw)?,
            None => ScrapeMode::FullGrid,
        };

        let lite_refresh_enabled = get_env_bool("LITE_REFRESH_ENABLED", true);
        let lite_refresh_interval_hours = get_env_u64("LITE_REFRESH_INTERVAL_HOURS", 6)?;

        let scrape_hour = match get_env_var_opt("SCRAPE_HOUR") {
            Some(raw) => parse_bounded(&raw, "SCRAPE_HOUR", 0, 23)?,
            None => 3,
        };
        let scrape_minute = match get_env_var_opt("SCRAPE_MINUTE") {
            Some(raw) => parse_bounded(&raw, "SCRAPE_MINUTE", 0, 59)?,
            None => 0,
        };

        let pricing_cache_enabled = get_env_bool("PRICING_CACHE_ENABLED", true);
        let pricing_cache_ttl_minutes = get_env_u64("PRICING_CACHE_TTL_MINUTES", 30)?;

        let cron_secret = get_env_var_opt("CRON_SECRET");

        Ok(Self {
            use_mock_store,
            scrape_mode,
            lite_refresh_enabled,
            lite_refresh_interval_hours,
            scrape_hour,
            scrape_minute,
            pricing_cache_enabled,
            pricing_cache_ttl_minutes,
            cron_secret,
        })
    }

    /// Requires a cron secret to be configured, for operator-only call sites.
    pub fn require_cron_secret(&self) -> Result<&str, ConfigError> {
        self.cron_secret
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("CRON_SECRET".to_string()))
    }
}

fn parse_bounded(raw: &str, name: &str, lo: u32, hi: u32) -> Result<u32, ConfigError> {
    let v: u32 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name: name.to_string(),
        reason: format!("{raw:?} is not an integer"),
    })?;
    if v < lo || v > hi {
        return Err(ConfigError::Invalid {
            name: name.to_string(),
            reason: format!("{v} is out of range [{lo}, {hi}]"),
        });
    }
    Ok(v)
}

/// Re-exported so callers needn't depend on the `env` module directly.
pub fn get_env_var_required(name: &str) -> Result<String, ConfigError> {
    get_env_var(name).map_err(ConfigError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_all() {
        for k in [
            "USE_MOCK_STORE",
            "SCRAPE_MODE",
            "LITE_REFRESH_ENABLED",
            "LITE_REFRESH_INTERVAL_HOURS",
            "SCRAPE_HOUR",
            "SCRAPE_MINUTE",
            "PRICING_CACHE_ENABLED",
            "PRICING_CACHE_TTL_MINUTES",
            "CRON_SECRET",
        ] {
            unsafe { std::env::remove_var(k) };
        }
    }

    #[test]
    fn defaults_match_spec() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_all();
        let cfg = PricingConfig::from_env().unwrap();
        assert!(!cfg.use_mock_store);
        assert_eq!(cfg.scrape_mode, ScrapeMode::FullGrid);
        assert!(cfg.lite_refresh_enabled);
        assert_eq!(cfg.lite_refresh_interval_hours, 6);
        assert_eq!(cfg.scrape_hour, 3);
        assert_eq!(cfg.scrape_minute, 0);
        assert!(cfg.pricing_cache_enabled);
        assert_eq!(cfg.pricing_cache_ttl_minutes, 30);
        assert!(cfg.cron_secret.is_none());
    }

    #[test]
    fn rejects_out_of_range_scrape_hour() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_all();
        unsafe { std::env::set_var("SCRAPE_HOUR", "24") };
        assert!(PricingConfig::from_env().is_err());
        unsafe { std::env::remove_var("SCRAPE_HOUR") };
    }

    #[test]
    fn rejects_unknown_scrape_mode() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_all();
        unsafe { std::env::set_var("SCRAPE_MODE", "BOGUS") };
        assert!(PricingConfig::from_env().is_err());
        unsafe { std::env::remove_var("SCRAPE_MODE") };
    }
}
