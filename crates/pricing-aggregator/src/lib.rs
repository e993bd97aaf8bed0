//! Market aggregator: rolls up competitor snapshots into per-`(branch_key,
//! class_bucket)` summary statistics the Quote Pricing Engine reads.

pub mod aggregate;
pub mod stats;

pub use aggregate::{read_aggregate, refresh_aggregates, CompetitorAggregate};
pub use stats::{compute, PriceStats};
