//! Provider abstraction for competitor page fetches.
//!
//! [`PageFetcher`] is the fetch capability parameter the orchestrator is
//! generic over: given a provider and a URL it returns rendered page bytes.
//! Concrete providers never know how to fetch; they only know how to parse
//! what a fetcher handed them. This mirrors splitting "how to get bytes"
//! from "how to interpret them" the way a `DataProvider` trait object
//! decouples vendor API calls from bar normalization.

pub mod parse;

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use rand::seq::SliceRandom;
use snafu::{Backtrace, ResultExt, Snafu};

/// The four illustrative Saudi car-rental competitor sites the grid walks.
/// Real vendor identities are out of scope; these are concrete variants
/// exercising the dispatch-by-provider shape the orchestrator needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Provider {
    Yelo,
    Theeb,
    Lumi,
    Key,
}

impl Provider {
    /// All providers the orchestrator walks the grid over, in a fixed order.
    pub const ALL: [Provider; 4] = [Provider::Yelo, Provider::Theeb, Provider::Lumi, Provider::Key];

    /// Lowercase key used in document ids and log lines.
    pub fn key(self) -> &'static str {
        match self {
            Provider::Yelo => "yelo",
            Provider::Theeb => "theeb",
            Provider::Lumi => "lumi",
            Provider::Key => "key",
        }
    }

    /// CSS-ish selectors considered stable enough to wait on before parsing.
    /// A fetcher without real DOM semantics (e.g. the test double) ignores this.
    pub fn ready_selectors(self) -> &'static [&'static str] {
        match self {
            Provider::Yelo => &[".vehicle-card", ".price-tag"],
            Provider::Theeb => &["[data-testid='fleet-item']"],
            Provider::Lumi => &[".rate-row"],
            Provider::Key => &["#results .offer"],
        }
    }
}

/// Errors a [`PageFetcher`] can raise for a single `(provider, url)` fetch.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum FetchError {
    #[snafu(display("request to {url} failed: {source}"))]
    Request {
        url: String,
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("timed out fetching {url} after {elapsed_ms} ms"))]
    Timeout { url: String, elapsed_ms: u64 },

    #[snafu(display("{provider:?} page at {url} looked like a dead link (dns/404 signal)"))]
    DeadLink { provider: Provider, url: String },
}

/// A pool of user agents rotated per fetch attempt.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36",
];

/// Picks a user agent at random from [`USER_AGENTS`].
pub fn random_user_agent() -> &'static str {
    USER_AGENTS.choose(&mut rand::thread_rng()).unwrap_or(&USER_AGENTS[0])
}

/// Jittered initial delay before a fetch attempt, in `[1.0, 3.0]` seconds.
pub fn initial_jitter() -> Duration {
    let millis = rand::thread_rng().gen_range(1_000..=3_000);
    Duration::from_millis(millis)
}

/// Fetches rendered page bytes for a provider/URL pair.
///
/// Implemented by [`ReqwestPageFetcher`] in production and by a scripted
/// test double in unit tests, the same dual-implementation shape a
/// dynamically dispatched fetch capability is built around: callers hold
/// `Arc<dyn PageFetcher>` and never know which one they have.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url` for `provider`, applying the per-attempt timeout internally.
    async fn fetch(&self, provider: Provider, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Production fetcher backed by a plain `reqwest::Client`.
///
/// This stands in for a headless-browser-driven fetch: it rotates a
/// user-agent per call and applies a 30s timeout, but does not itself
/// render JavaScript. The selector-waiting and image/font blocking the
/// grid's fetch contract describes are properties of the (external)
/// browser automation layer this trait abstracts away.
pub struct ReqwestPageFetcher {
    client: reqwest::Client,
}

impl ReqwestPageFetcher {
    /// Builds a fetcher with the 30s per-attempt timeout the grid contract requires.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for ReqwestPageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for ReqwestPageFetcher {
    async fn fetch(&self, provider: Provider, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", random_user_agent())
            .send()
            .await
            .context(RequestSnafu { url: url.to_string() })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::DeadLink { provider, url: url.to_string() });
        }

        let bytes = response
            .bytes()
            .await
            .context(RequestSnafu { url: url.to_string() })?;
        Ok(bytes.to_vec())
    }
}

/// Test double returning canned bytes per URL, keyed by exact match.
/// Mirrors the teacher's pattern of two trait impls (`AlpacaProvider`,
/// `PolygonProvider`) selected behind a `Box<dyn DataProvider>`.
#[derive(Default, Clone)]
pub struct ScriptedPageFetcher {
    pub responses: std::collections::HashMap<String, Vec<u8>>,
}

impl ScriptedPageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(url.into(), body.into());
        self
    }
}

#[async_trait]
impl PageFetcher for ScriptedPageFetcher {
    async fn fetch(&self, _provider: Provider, url: &str) -> Result<Vec<u8>, FetchError> {
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Timeout { url: url.to_string(), elapsed_ms: 30_000 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_fetcher_returns_canned_body() {
        let fetcher = ScriptedPageFetcher::new().with_response("https://yelo.sa/riyadh", b"<html></html>".to_vec());
        let bytes = fetcher.fetch(Provider::Yelo, "https://yelo.sa/riyadh").await.unwrap();
        assert_eq!(bytes, b"<html></html>");
    }

    #[tokio::test]
    async fn scripted_fetcher_missing_url_times_out() {
        let fetcher = ScriptedPageFetcher::new();
        let result = fetcher.fetch(Provider::Theeb, "https://theeb.sa/unknown").await;
        assert!(matches!(result, Err(FetchError::Timeout { .. })));
    }

    #[test]
    fn every_provider_has_a_key_and_selectors() {
        for provider in Provider::ALL {
            assert!(!provider.key().is_empty());
            assert!(!provider.ready_selectors().is_empty());
        }
    }
}
