//! Money rounding helpers. All prices are `f64` SAR with two-place rounding
//! on output; the step-rounding policy here is the uniform nearest-5 (or
//! nearest-1 below 50) adopted by the pricing engine (spec §4.6, §9).

/// Rounds to two decimal places, the wire/storage precision for all money
/// fields.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// The rounding step for a given price level: 5 once the price reaches 50,
/// else 1.
pub fn step_for(price: f64) -> f64 {
    if price >= 50.0 { 5.0 } else { 1.0 }
}

/// Clamps `price` into `[floor, ceiling]`, derives the step from *that*
/// clamped value (not the raw input), then rounds to the nearest multiple of
/// the step and re-clamps. If ordinary rounding would cross a bound, rounds
/// toward that bound instead (floor-round toward the ceiling, ceil-round
/// toward the floor) so the result never leaves the band.
pub fn round_to_step_in_band(price: f64, floor: f64, ceiling: f64) -> f64 {
    let clamped = price.clamp(floor, ceiling);
    let step = step_for(clamped);
    let mut snapped = (clamped / step).round() * step;

    if snapped > ceiling {
        snapped = (ceiling / step).floor() * step;
    }
    if snapped < floor {
        snapped = (floor / step).ceil() * step;
    }

    round2(snapped.clamp(floor, ceiling))
}

/// Clamps `v` into `[lo, hi]`, raising `hi` to `lo` first when `lo > hi`
/// (the "profit-first" guardrail override, spec §4.6).
pub fn clip_profit_first(v: f64, lo: f64, hi: f64) -> (f64, f64, f64) {
    let hi = if lo > hi { lo } else { hi };
    (v.clamp(lo, hi), lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_two_places() {
        assert_eq!(round2(12.345), 12.35);
        assert_eq!(round2(12.344), 12.34);
    }

    #[test]
    fn step_is_five_above_fifty() {
        assert_eq!(step_for(49.99), 1.0);
        assert_eq!(step_for(50.0), 5.0);
    }

    #[test]
    fn snaps_within_band() {
        // S3 scenario: floor=109.25, ceiling=110 -> nearest step-5 within band is 110.
        let got = round_to_step_in_band(109.5, 109.25, 110.0);
        assert_eq!(got, 110.0);
    }

    #[test]
    fn step_is_keyed_off_the_clamped_value_not_the_raw_price() {
        // Raw price 20 is below 50 (step 1), but the band floor clamps it up
        // to 122, which is above 50 and must land on a multiple of 5. Nearest
        // step-5 to 122 is 120, which falls back below the floor, so the
        // ceil-toward-floor correction lands on 125.
        let got = round_to_step_in_band(20.0, 122.0, 140.0);
        assert_eq!(got, 125.0);
        assert_eq!(got % 5.0, 0.0);
    }

    #[test]
    fn profit_first_raises_ceiling_to_floor() {
        let (clamped, lo, hi) = clip_profit_first(50.0, 120.0, 100.0);
        assert_eq!(lo, 120.0);
        assert_eq!(hi, 120.0);
        assert_eq!(clamped, 120.0);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Whatever comes in, the snapped price never leaves `[floor, ceiling]`
        /// and always lands on a multiple of the step its own clamped value
        /// implies (5 once that value reaches 50, else 1).
        #[test]
        fn round_to_step_in_band_stays_in_band_and_on_step(
            price in -500.0f64..3000.0,
            floor in 0.0f64..500.0,
            // Keep the band comfortably wider than the largest step (5) so
            // there is always an on-step value for the corrections to land
            // on; a band narrower than its own step is a separate, known
            // degenerate case this invariant does not cover.
            span in 10.0f64..500.0,
        ) {
            let ceiling = floor + span;
            let got = round_to_step_in_band(price, floor, ceiling);
            prop_assert!(got >= floor - 0.001);
            prop_assert!(got <= ceiling + 0.001);

            let step = step_for(got);
            let steps = got / step;
            prop_assert!((steps - steps.round()).abs() < 0.001);
        }
    }
}
