//! The normalized competitor offer written to the snapshot collection.

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::providers::parse::ClassBucket;
use crate::providers::Provider;

/// One scraped competitor offer, ready to write to the `competitor_prices`
/// collection via [`pricing_store::DocumentStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorOffer {
    pub provider: String,
    pub branch_key: String,
    pub class_bucket: String,
    pub vehicle_name: String,
    pub price_per_day: f64,
    pub duration_days: u32,
    pub currency: String,
    pub scraped_at: DateTime<Utc>,
    pub source_url: String,
    pub hash: String,
}

impl CompetitorOffer {
    pub fn new(
        provider: Provider,
        branch_key: &str,
        class_bucket: ClassBucket,
        vehicle_name: &str,
        price_per_day: f64,
        duration_days: u32,
        currency: &str,
        scraped_at: DateTime<Utc>,
        source_url: &str,
    ) -> Self {
        let hash = offer_hash(provider, branch_key, class_bucket, price_per_day);
        Self {
            provider: provider.key().to_string(),
            branch_key: branch_key.to_string(),
            class_bucket: class_bucket.as_str().to_string(),
            vehicle_name: vehicle_name.to_string(),
            price_per_day,
            duration_days,
            currency: currency.to_string(),
            scraped_at,
            source_url: source_url.to_string(),
            hash,
        }
    }
}

/// `hash = md5(provider|branch|class|round(price))`, the dedup key compared
/// against offers scraped in the last 6 hours.
pub fn offer_hash(provider: Provider, branch_key: &str, class_bucket: ClassBucket, price_per_day: f64) -> String {
    let input = format!(
        "{}|{}|{}|{}",
        provider.key(),
        branch_key,
        class_bucket.as_str(),
        price_per_day.round() as i64
    );
    let digest = Md5::digest(input.as_bytes());
    format!("{digest:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_for_identical_inputs() {
        let a = offer_hash(Provider::Yelo, "riy-001", ClassBucket::Suv, 349.6);
        let b = offer_hash(Provider::Yelo, "riy-001", ClassBucket::Suv, 349.6);
        assert_eq!(a, b);
    }

    #[test]
    fn hash_rounds_price_before_hashing() {
        let a = offer_hash(Provider::Yelo, "riy-001", ClassBucket::Suv, 349.6);
        let b = offer_hash(Provider::Yelo, "riy-001", ClassBucket::Suv, 349.4);
        assert_eq!(a, b, "both round to 350");
    }

    #[test]
    fn hash_differs_across_providers() {
        let a = offer_hash(Provider::Yelo, "riy-001", ClassBucket::Suv, 350.0);
        let b = offer_hash(Provider::Theeb, "riy-001", ClassBucket::Suv, 350.0);
        assert_ne!(a, b);
    }
}
