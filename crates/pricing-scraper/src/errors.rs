use snafu::{Backtrace, Snafu};

use crate::providers::FetchError;

/// The unified error type for the `pricing-scraper` crate.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// An error originating from a page fetch (timeout, DNS, HTTP failure).
    #[snafu(display("Fetch error: {source}"))]
    Fetch {
        #[snafu(backtrace)]
        source: FetchError,
    },

    /// An error originating from the document store while writing snapshots.
    #[snafu(display("Store error: {source}"))]
    Store {
        source: pricing_store::StoreError,
        backtrace: Backtrace,
    },

    /// An error related to configuration.
    #[snafu(display("Configuration error: {message}"))]
    Config {
        message: String,
        backtrace: Backtrace,
    },
}
