//! Pure pricing rule engine: multiplicative factors and guardrails applied
//! to a numeric baseline, in a fixed order, with no I/O or side effects.

use std::collections::HashMap;

use pricing_shared::money::round2;

/// Inputs the rule engine needs for one pricing decision.
#[derive(Debug, Clone, Copy)]
pub struct PricingFactors {
    pub baseline_price_ml: f64,
    pub base_daily_rate: f64,
    pub rental_length_days: i64,
    pub lead_time_days: i64,
    pub utilization_rate: f64,
    pub demand_index: f64,
    pub avg_competitor_price: f64,
    /// 0 = Monday .. 6 = Sunday.
    pub day_of_week: u32,
    /// 1-12.
    pub month: u32,
    pub hour_of_booking: Option<u32>,
    pub last_quoted_price: Option<f64>,
}

/// Tunable guardrail parameters. Defaults match spec §4.5 exactly.
#[derive(Debug, Clone, Copy)]
pub struct RuleEngineConfig {
    pub min_margin: f64,
    pub max_ceiling_multiplier: f64,
    pub competitor_band_tolerance: f64,
    pub max_rate_change: f64,
    pub smoothing_alpha: f64,
}

impl Default for RuleEngineConfig {
    fn default() -> Self {
        Self {
            min_margin: 0.15,
            max_ceiling_multiplier: 3.0,
            competitor_band_tolerance: 0.20,
            max_rate_change: 0.08,
            smoothing_alpha: 0.3,
        }
    }
}

/// Output of [`calculate_price`]: the final price plus a full audit trail.
#[derive(Debug, Clone)]
pub struct PricingResult {
    pub final_price_per_day: f64,
    pub baseline_price: f64,
    pub factors_applied: HashMap<String, f64>,
    pub guardrails_applied: Vec<String>,
    pub price_breakdown: HashMap<String, f64>,
}

/// Applies every factor and guardrail in spec §4.5's fixed order to
/// `factors.baseline_price_ml`, returning the rounded final price and a full
/// breakdown. Pure: no I/O, no randomness, no clock reads.
pub fn calculate_price(factors: &PricingFactors, config: &RuleEngineConfig) -> PricingResult {
    let baseline_price = factors.baseline_price_ml;
    let mut current_price = baseline_price;

    let mut factors_applied = HashMap::new();
    let mut guardrails_applied = Vec::new();
    let mut breakdown = HashMap::new();
    breakdown.insert("baseline_ml".to_string(), baseline_price);

    let utilization_factor = utilization_factor(factors.utilization_rate);
    current_price *= utilization_factor;
    factors_applied.insert("utilization".to_string(), utilization_factor);
    breakdown.insert("after_utilization".to_string(), current_price);

    let lead_time_factor = lead_time_factor(factors.lead_time_days);
    current_price *= lead_time_factor;
    factors_applied.insert("lead_time".to_string(), lead_time_factor);
    breakdown.insert("after_lead_time".to_string(), current_price);

    let duration_factor = duration_factor(factors.rental_length_days);
    current_price *= duration_factor;
    factors_applied.insert("duration".to_string(), duration_factor);
    breakdown.insert("after_duration".to_string(), current_price);

    if let Some(hour) = factors.hour_of_booking {
        let late_night_factor = late_night_factor(hour);
        current_price *= late_night_factor;
        factors_applied.insert("late_night".to_string(), late_night_factor);
        breakdown.insert("after_late_night".to_string(), current_price);
    }

    let weekend_factor = weekend_factor(factors.day_of_week);
    let season_factor = season_factor(factors.month);
    current_price *= weekend_factor * season_factor;
    factors_applied.insert("weekend".to_string(), weekend_factor);
    factors_applied.insert("season".to_string(), season_factor);
    breakdown.insert("after_temporal".to_string(), current_price);

    let demand_factor = demand_factor(factors.demand_index);
    current_price *= demand_factor;
    factors_applied.insert("demand".to_string(), demand_factor);
    breakdown.insert("after_demand".to_string(), current_price);

    // === guardrails, in fixed order ===

    let cost_floor = factors.base_daily_rate * (1.0 + config.min_margin);
    if current_price < cost_floor {
        current_price = cost_floor;
        guardrails_applied.push("cost_floor".to_string());
        breakdown.insert("cost_floor_applied".to_string(), cost_floor);
    }

    let absolute_ceiling = factors.base_daily_rate * config.max_ceiling_multiplier;
    if current_price > absolute_ceiling {
        current_price = absolute_ceiling;
        guardrails_applied.push("absolute_ceiling".to_string());
        breakdown.insert("ceiling_applied".to_string(), absolute_ceiling);
    }

    if factors.avg_competitor_price > 0.0 {
        let lower_band = factors.avg_competitor_price * (1.0 - config.competitor_band_tolerance);
        let upper_band = factors.avg_competitor_price * (1.0 + config.competitor_band_tolerance);
        if current_price < lower_band {
            current_price = lower_band;
            guardrails_applied.push("competitor_floor".to_string());
            breakdown.insert("competitor_floor".to_string(), lower_band);
        } else if current_price > upper_band {
            current_price = upper_band;
            guardrails_applied.push("competitor_ceiling".to_string());
            breakdown.insert("competitor_ceiling".to_string(), upper_band);
        }
    }

    if let Some(last) = factors.last_quoted_price.filter(|&p| p > 0.0) {
        let max_increase = last * (1.0 + config.max_rate_change);
        let max_decrease = last * (1.0 - config.max_rate_change);
        if current_price > max_increase {
            current_price = max_increase;
            guardrails_applied.push("rate_change_cap".to_string());
            breakdown.insert("rate_change_cap".to_string(), max_increase);
        } else if current_price < max_decrease {
            current_price = max_decrease;
            guardrails_applied.push("rate_change_floor".to_string());
            breakdown.insert("rate_change_floor".to_string(), max_decrease);
        }
    }

    if let Some(last) = factors.last_quoted_price.filter(|&p| p > 0.0) {
        let smoothed = config.smoothing_alpha * current_price + (1.0 - config.smoothing_alpha) * last;
        current_price = smoothed;
        guardrails_applied.push("exponential_smoothing".to_string());
        breakdown.insert("after_smoothing".to_string(), smoothed);
    }

    breakdown.insert("final_price".to_string(), current_price);

    PricingResult {
        final_price_per_day: round2(current_price),
        baseline_price,
        factors_applied,
        guardrails_applied,
        price_breakdown: breakdown,
    }
}

fn utilization_factor(rate: f64) -> f64 {
    if rate <= 0.3 {
        0.90
    } else if rate <= 0.5 {
        0.95
    } else if rate <= 0.7 {
        1.00
    } else if rate <= 0.85 {
        1.10
    } else {
        1.20
    }
}

fn lead_time_factor(days: i64) -> f64 {
    if days < 1 {
        1.25
    } else if days < 3 {
        1.15
    } else if days < 7 {
        1.05
    } else if days < 14 {
        1.00
    } else if days < 30 {
        0.95
    } else {
        0.90
    }
}

fn duration_factor(days: i64) -> f64 {
    if days >= 30 {
        0.80
    } else if days >= 15 {
        0.82
    } else if days >= 14 {
        0.85
    } else if days >= 8 {
        0.88
    } else if days >= 7 {
        0.90
    } else if days >= 4 {
        0.95
    } else if days >= 3 {
        0.97
    } else {
        1.00
    }
}

fn late_night_factor(hour: u32) -> f64 {
    if (22..=23).contains(&hour) || hour <= 5 { 1.10 } else { 1.00 }
}

fn weekend_factor(day_of_week: u32) -> f64 {
    if matches!(day_of_week, 3 | 4 | 5) { 1.10 } else { 1.00 }
}

fn season_factor(month: u32) -> f64 {
    match month {
        10 | 11 | 12 | 1 | 2 | 3 | 4 => 1.15,
        7 | 8 => 0.90,
        _ => 0.95,
    }
}

fn demand_factor(index: f64) -> f64 {
    if index < 0.2 {
        0.90
    } else if index < 0.4 {
        0.95
    } else if index < 0.6 {
        1.00
    } else if index < 0.8 {
        1.10
    } else {
        1.20
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    prop_compose! {
        fn arb_factors()(
            baseline_price_ml in 10.0f64..2000.0,
            base_daily_rate in 10.0f64..1000.0,
            rental_length_days in 1i64..60,
            lead_time_days in 0i64..90,
            utilization_rate in 0.0f64..1.0,
            demand_index in 0.0f64..1.0,
            avg_competitor_price in 0.0f64..1500.0,
            day_of_week in 0u32..7,
            month in 1u32..13,
        ) -> PricingFactors {
            PricingFactors {
                baseline_price_ml,
                base_daily_rate,
                rental_length_days,
                lead_time_days,
                utilization_rate,
                demand_index,
                avg_competitor_price,
                day_of_week,
                month,
                hour_of_booking: None,
                last_quoted_price: None,
            }
        }
    }

    proptest! {
        /// With no competitor band and no prior quote to smooth against, the
        /// cost floor and absolute ceiling are the last guardrails to run and
        /// always hold exactly.
        #[test]
        fn final_price_always_within_cost_floor_and_ceiling_absent_competitor_band(mut factors in arb_factors()) {
            factors.avg_competitor_price = 0.0;
            let config = RuleEngineConfig::default();
            let result = calculate_price(&factors, &config);
            let floor = factors.base_daily_rate * (1.0 + config.min_margin);
            let ceiling = factors.base_daily_rate * config.max_ceiling_multiplier;
            prop_assert!(result.final_price_per_day >= floor - 0.01);
            prop_assert!(result.final_price_per_day <= ceiling + 0.01);
        }

        /// The result is always a finite, positive number, whatever the inputs.
        #[test]
        fn final_price_is_always_finite_and_positive(factors in arb_factors()) {
            let result = calculate_price(&factors, &RuleEngineConfig::default());
            prop_assert!(result.final_price_per_day.is_finite());
            prop_assert!(result.final_price_per_day > 0.0);
        }
    }
}
