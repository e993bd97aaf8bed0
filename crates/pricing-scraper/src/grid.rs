//! Scrape grid configuration: which `(pickup_date, duration, pickup_time)`
//! cells the orchestrator walks for a given scrape mode.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Utc, Weekday};
use pricing_shared::config::ScrapeMode;

/// A single pickup-time-of-day slot in the grid, expressed as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickupTime {
    pub hour: u32,
    pub minute: u32,
}

impl PickupTime {
    pub const fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }
}

/// The fully expanded grid for one run: every pickup date, rental duration,
/// and pickup time the orchestrator will combine with every
/// `(provider, branch, class)` to form a fetch cell.
#[derive(Debug, Clone)]
pub struct ScrapeGrid {
    pub pickup_dates: Vec<DateTime<Utc>>,
    pub durations: Vec<u32>,
    pub pickup_times: Vec<PickupTime>,
}

impl ScrapeGrid {
    /// Number of `(date, duration, time)` combinations per city.
    pub fn cell_count(&self) -> usize {
        self.pickup_dates.len() * self.durations.len() * self.pickup_times.len()
    }
}

/// Builds the grid for `mode`, anchored at `now`.
pub fn build_grid(mode: ScrapeMode, now: DateTime<Utc>) -> ScrapeGrid {
    let tomorrow = now + ChronoDuration::days(1);

    match mode {
        ScrapeMode::FastGrid => ScrapeGrid {
            pickup_dates: vec![tomorrow],
            durations: vec![3, 7],
            pickup_times: vec![PickupTime::new(10, 0)],
        },
        ScrapeMode::FullGrid => ScrapeGrid {
            pickup_dates: vec![
                tomorrow,
                now + ChronoDuration::days(3),
                now + ChronoDuration::days(7),
                now + ChronoDuration::days(14),
                next_friday(now),
            ],
            durations: vec![1, 3, 7, 30],
            pickup_times: vec![PickupTime::new(10, 0), PickupTime::new(18, 0)],
        },
        ScrapeMode::AirportQuote => ScrapeGrid {
            pickup_dates: vec![tomorrow],
            durations: vec![1],
            pickup_times: vec![PickupTime::new(10, 0)],
        },
    }
}

/// The next Friday strictly after `now` (if `now` is a Friday, returns the
/// following week's Friday).
fn next_friday(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.weekday();
    let days_until = (Weekday::Fri.num_days_from_monday() as i64
        - today.num_days_from_monday() as i64)
        .rem_euclid(7);
    let days_until = if days_until == 0 { 7 } else { days_until };
    now + ChronoDuration::days(days_until)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fast_grid_has_one_date_two_durations_one_time() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        let grid = build_grid(ScrapeMode::FastGrid, now);
        assert_eq!(grid.pickup_dates.len(), 1);
        assert_eq!(grid.durations, vec![3, 7]);
        assert_eq!(grid.cell_count(), 2);
    }

    #[test]
    fn full_grid_has_five_dates_four_durations_two_times() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        let grid = build_grid(ScrapeMode::FullGrid, now);
        assert_eq!(grid.pickup_dates.len(), 5);
        assert_eq!(grid.durations.len(), 4);
        assert_eq!(grid.pickup_times.len(), 2);
        assert_eq!(grid.cell_count(), 40);
    }

    #[test]
    fn next_friday_skips_today_when_today_is_friday() {
        // 2026-03-06 is a Friday.
        let friday = Utc.with_ymd_and_hms(2026, 3, 6, 8, 0, 0).unwrap();
        let next = next_friday(friday);
        assert_eq!(next.weekday(), Weekday::Fri);
        assert_eq!((next - friday).num_days(), 7);
    }

    #[test]
    fn next_friday_from_monday_is_four_days_away() {
        let monday = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        assert_eq!(monday.weekday(), Weekday::Mon);
        let next = next_friday(monday);
        assert_eq!((next - monday).num_days(), 4);
    }
}
