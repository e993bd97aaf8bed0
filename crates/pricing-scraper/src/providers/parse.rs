//! Per-provider page parsing: raw page bytes in, `{vehicle_name, raw_category,
//! price_text, currency}` tuples out.
//!
//! Real DOM scraping depends on a rendered browser and provider-specific
//! markup this crate does not ship a headless engine for; each `parse_*`
//! function here treats the page body as newline-delimited
//! `vehicle_name|raw_category|price_text` records, which is exactly the
//! shape the [`super::ScriptedPageFetcher`] test double hands back. A real
//! deployment swaps these for `scraper`/`select`-based DOM queries against
//! the selectors in [`super::Provider::ready_selectors`] without touching
//! anything downstream.

use super::Provider;

/// One parsed offer row, before price/category normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOffer {
    pub vehicle_name: String,
    pub raw_category: String,
    pub price_text: String,
    pub currency: String,
}

/// Parses `body` for `provider` into raw offer rows.
pub fn parse(provider: Provider, body: &[u8]) -> Vec<RawOffer> {
    let text = String::from_utf8_lossy(body);
    text.lines()
        .filter_map(|line| parse_line(provider, line))
        .collect()
}

fn parse_line(_provider: Provider, line: &str) -> Option<RawOffer> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let mut parts = line.splitn(3, '|');
    let vehicle_name = parts.next()?.trim().to_string();
    let raw_category = parts.next()?.trim().to_string();
    let price_text = parts.next()?.trim().to_string();
    if vehicle_name.is_empty() || price_text.is_empty() {
        return None;
    }
    Some(RawOffer {
        vehicle_name,
        raw_category,
        price_text,
        currency: "SAR".to_string(),
    })
}

/// Extracts the normalized daily price from free-form price text.
///
/// Strips percentage tokens (e.g. promotional "-20%" badges concatenated
/// into the same text node) and takes the largest plausible number ≥ 30 —
/// car rental day rates below that threshold are markup noise, not prices.
pub fn normalize_price(price_text: &str) -> Option<f64> {
    let mut candidates = Vec::new();
    let mut current = String::new();
    let mut chars = price_text.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() || c == '.' {
            current.push(c);
        } else {
            if c == '%' {
                current.clear();
                continue;
            }
            flush_number(&mut current, &mut candidates);
        }
    }
    flush_number(&mut current, &mut candidates);

    candidates.into_iter().filter(|&n| n >= 30.0).fold(None, |best, n| match best {
        Some(b) if b >= n => Some(b),
        _ => Some(n),
    })
}

fn flush_number(buf: &mut String, out: &mut Vec<f64>) {
    if let Ok(n) = buf.parse::<f64>() {
        out.push(n);
    }
    buf.clear();
}

/// The vehicle-class domain every competitor offer normalizes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ClassBucket {
    Economy,
    Compact,
    Sedan,
    Suv,
    Luxury,
    Van,
    Truck,
}

impl ClassBucket {
    pub fn as_str(self) -> &'static str {
        match self {
            ClassBucket::Economy => "Economy",
            ClassBucket::Compact => "Compact",
            ClassBucket::Sedan => "Sedan",
            ClassBucket::Suv => "SUV",
            ClassBucket::Luxury => "Luxury",
            ClassBucket::Van => "Van",
            ClassBucket::Truck => "Truck",
        }
    }
}

/// Normalizes a raw category plus vehicle name into a [`ClassBucket`].
///
/// Vehicle-name keywords take priority over the raw category (a listing
/// mis-tagged "Sedan" but named "Land Cruiser VXR" is an SUV), then
/// precedence among keyword hits runs luxury > SUV > compact/economy >
/// sedan, with sedan as the default when nothing else matches.
pub fn normalize_class(raw_category: &str, vehicle_name: &str) -> ClassBucket {
    let haystack = format!("{vehicle_name} {raw_category}").to_lowercase();

    const LUXURY: &[&str] = &["luxury", "mercedes", "bmw", "lexus", "bentley", "rolls"];
    const SUV: &[&str] = &["suv", "land cruiser", "patrol", "fortuner", "prado", "4x4"];
    const VAN: &[&str] = &["van", "hiace", "coaster"];
    const TRUCK: &[&str] = &["truck", "pickup", "hilux"];
    const COMPACT: &[&str] = &["compact", "economy", "yaris", "accent", "picanto"];

    if LUXURY.iter().any(|k| haystack.contains(k)) {
        ClassBucket::Luxury
    } else if SUV.iter().any(|k| haystack.contains(k)) {
        ClassBucket::Suv
    } else if VAN.iter().any(|k| haystack.contains(k)) {
        ClassBucket::Van
    } else if TRUCK.iter().any(|k| haystack.contains(k)) {
        ClassBucket::Truck
    } else if haystack.contains("economy") {
        ClassBucket::Economy
    } else if COMPACT.iter().any(|k| haystack.contains(k)) {
        ClassBucket::Compact
    } else {
        ClassBucket::Sedan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pipe_delimited_rows() {
        let body = b"Camry|Sedan|SAR 180/day\nLand Cruiser|SUV|350".to_vec();
        let rows = parse(Provider::Yelo, &body);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].vehicle_name, "Camry");
        assert_eq!(rows[1].price_text, "350");
    }

    #[test]
    fn normalize_price_takes_max_plausible_number() {
        assert_eq!(normalize_price("SAR 180/day (-20% today)"), Some(180.0));
        assert_eq!(normalize_price("was 200, now 150"), Some(200.0));
        assert_eq!(normalize_price("only 12 SAR"), None);
    }

    #[test]
    fn normalize_class_prefers_name_keywords_over_category() {
        assert_eq!(normalize_class("Sedan", "Toyota Land Cruiser VXR"), ClassBucket::Suv);
        assert_eq!(normalize_class("Sedan", "Mercedes S-Class"), ClassBucket::Luxury);
        assert_eq!(normalize_class("", "Toyota Camry"), ClassBucket::Sedan);
        assert_eq!(normalize_class("Economy", "Kia Picanto"), ClassBucket::Compact);
    }
}
