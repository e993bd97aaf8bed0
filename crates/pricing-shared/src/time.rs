//! Calendar helpers shared by the rule engine, pricing engine, and signal
//! builder: duration-key bucketing, the Saudi weekend, and season bucketing.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};

/// Rental-length bucket used for cache keys and duration discounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DurationKey {
    D1,
    D3,
    D7,
    M1,
}

impl DurationKey {
    /// Maps a rental length in days to its bucket: 1 -> D1, 2-4 -> D3,
    /// 5-10 -> D7, 11+ -> M1.
    pub fn from_days(days: i64) -> Self {
        match days {
            ..=1 => DurationKey::D1,
            2..=4 => DurationKey::D3,
            5..=10 => DurationKey::D7,
            _ => DurationKey::M1,
        }
    }

    /// The stable wire/cache-key token for this bucket.
    pub fn as_str(&self) -> &'static str {
        match self {
            DurationKey::D1 => "D1",
            DurationKey::D3 => "D3",
            DurationKey::D7 => "D7",
            DurationKey::M1 => "M1",
        }
    }
}

/// Whole-day duration between two instants. Negative when `end <= start`.
pub fn duration_days(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_seconds().div_euclid(86_400)
}

/// Saudi weekend: Thursday, Friday, Saturday.
pub fn is_weekend(at: DateTime<Utc>) -> bool {
    matches!(at.weekday(), Weekday::Thu | Weekday::Fri | Weekday::Sat)
}

/// `day_of_week` feature convention used throughout the pricing core:
/// 0 = Monday .. 6 = Sunday.
pub fn day_of_week_index(at: DateTime<Utc>) -> u32 {
    at.weekday().num_days_from_monday()
}

/// Late-night booking window: 22:00-05:59 local/UTC.
pub fn is_late_night(at: DateTime<Utc>) -> bool {
    let hour = at.hour();
    (22..=23).contains(&hour) || hour <= 5
}

/// Saudi-climate season multiplier bucket for a calendar month (1-12).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    /// Pleasant-weather peak months: Oct-Apr.
    Peak,
    /// Extreme-heat months: Jul-Aug.
    Heat,
    /// Shoulder months: everything else.
    Shoulder,
}

impl Season {
    pub fn from_month(month: u32) -> Self {
        match month {
            10 | 11 | 12 | 1 | 2 | 3 | 4 => Season::Peak,
            7 | 8 => Season::Heat,
            _ => Season::Shoulder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn duration_key_boundaries() {
        assert_eq!(DurationKey::from_days(1).as_str(), "D1");
        assert_eq!(DurationKey::from_days(2).as_str(), "D3");
        assert_eq!(DurationKey::from_days(4).as_str(), "D3");
        assert_eq!(DurationKey::from_days(5).as_str(), "D7");
        assert_eq!(DurationKey::from_days(10).as_str(), "D7");
        assert_eq!(DurationKey::from_days(11).as_str(), "M1");
    }

    #[test]
    fn weekend_is_thu_fri_sat() {
        // 2026-03-12 is a Thursday.
        let thu = Utc.with_ymd_and_hms(2026, 3, 12, 10, 0, 0).unwrap();
        let sun = Utc.with_ymd_and_hms(2026, 3, 15, 10, 0, 0).unwrap();
        assert!(is_weekend(thu));
        assert!(!is_weekend(sun));
    }

    #[test]
    fn season_month_boundaries() {
        assert_eq!(Season::from_month(4), Season::Peak);
        assert_eq!(Season::from_month(5), Season::Shoulder);
        assert_eq!(Season::from_month(8), Season::Heat);
        assert_eq!(Season::from_month(9), Season::Shoulder);
    }

    #[test]
    fn late_night_window() {
        let ten_pm = Utc.with_ymd_and_hms(2026, 1, 1, 22, 0, 0).unwrap();
        let five_am = Utc.with_ymd_and_hms(2026, 1, 1, 5, 59, 0).unwrap();
        let noon = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        assert!(is_late_night(ten_pm));
        assert!(is_late_night(five_am));
        assert!(!is_late_night(noon));
    }
}
