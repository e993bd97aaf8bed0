//! Summary statistics over a set of competitor `price_per_day` samples.

/// Sorted-array-interpolation percentile plus sample standard deviation over
/// one `(branch_key, class_bucket)` bucket's prices.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceStats {
    pub count: usize,
    pub min: f64,
    pub median: f64,
    pub mean: f64,
    pub p75: f64,
    pub p90: f64,
    pub std: f64,
}

/// Computes [`PriceStats`] over `prices`. Returns `None` for an empty slice —
/// a key with no samples in the window yields no aggregate document.
pub fn compute(prices: &[f64]) -> Option<PriceStats> {
    if prices.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = prices.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let count = sorted.len();
    let min = sorted[0];
    let mean = sorted.iter().sum::<f64>() / count as f64;
    let median = percentile(&sorted, 0.50);
    let p75 = percentile(&sorted, 0.75);
    let p90 = percentile(&sorted, 0.90);
    let std = if count == 1 {
        0.0
    } else {
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count as f64 - 1.0);
        variance.sqrt()
    };

    Some(PriceStats { count, min, median, mean, p75, p90, std })
}

/// Linear-interpolation percentile over an already-sorted slice (`p` in `[0,1]`).
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let weight = rank - lower as f64;
        sorted[lower] + (sorted[upper] - sorted[lower]) * weight
    }
}
