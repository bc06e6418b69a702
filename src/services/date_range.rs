// src/services/date_range.rs

use chrono::{DateTime, Days, NaiveTime, Utc};
use std::collections::HashMap;

use crate::models::analytics::{DateRange, TimeSeriesPoint};

/// Window used when the `range` query parameter is absent or unrecognized.
pub const DEFAULT_RANGE_DAYS: u64 = 30;

/// Maps a range key ('7d', '30d', '90d') to a window ending today.
pub fn parse_date_range(range: Option<&str>) -> DateRange {
    parse_date_range_at(range, Utc::now())
}

pub fn parse_date_range_at(range: Option<&str>, now: DateTime<Utc>) -> DateRange {
    let days = match range {
        Some("7d") => 7,
        Some("90d") => 90,
        _ => DEFAULT_RANGE_DAYS,
    };
    last_n_days_at(days, now)
}

/// The last `days` calendar days (UTC), today included:
/// 00:00:00.000 of the first day to 23:59:59.999 today.
pub fn last_n_days_at(days: u64, now: DateTime<Utc>) -> DateRange {
    let today = now.date_naive();
    let first_day = today
        .checked_sub_days(Days::new(days.saturating_sub(1)))
        .unwrap_or(today);

    let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);

    DateRange::new(
        first_day.and_time(NaiveTime::MIN).and_utc(),
        today.and_time(end_of_day).and_utc(),
    )
}

/// One point per calendar day of `range`, in order, with 0 for days
/// missing from `data`.
pub fn fill_missing_dates(data: &[TimeSeriesPoint], range: &DateRange) -> Vec<TimeSeriesPoint> {
    let counts: HashMap<&str, i64> = data.iter().map(|p| (p.date.as_str(), p.count)).collect();

    let last = range.end.date_naive();
    let mut day = range.start.date_naive();
    let mut filled = Vec::new();

    while day <= last {
        let date = day.format("%Y-%m-%d").to_string();
        let count = counts.get(date.as_str()).copied().unwrap_or(0);
        filled.push(TimeSeriesPoint { date, count });

        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    filled
}
