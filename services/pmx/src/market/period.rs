use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::Serialize;
use std::fmt;

pub const DEFAULT_LOOKBACK_YEARS: u32 = 3;

/// Closed date interval `[from, to]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Period {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl Period {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}]",
            self.from.format("%Y-%m-%d"),
            self.to.format("%Y-%m-%d")
        )
    }
}

/// Calendar boundaries derived from "today"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodBounds {
    pub lookback_start: NaiveDate,
    pub lookback_end: NaiveDate,
    pub prior_year_end: NaiveDate,
}

impl PeriodBounds {
    pub fn resolve(today: NaiveDate) -> Self {
        Self::resolve_with(today, DEFAULT_LOOKBACK_YEARS)
    }

    pub fn resolve_with(today: NaiveDate, lookback_years: u32) -> Self {
        let years_ago = today - Months::new(12 * lookback_years);
        let last_year = today - Months::new(12);

        Self {
            lookback_start: month_start(years_ago),
            lookback_end: previous_month_end(today),
            prior_year_end: previous_month_end(last_year),
        }
    }

    /// Window bounding every fetch
    pub fn lookback(&self) -> Period {
        Period::new(self.lookback_start, self.lookback_end)
    }

    /// Everything averages or YoY may read: the lookback window widened to
    /// cover the prior-year window
    pub fn fetch_window(&self) -> Period {
        let from = self.lookback_start.min(self.prior().from);
        Period::new(from, self.lookback_end)
    }

    /// Year to date, ending with the last complete month
    pub fn current(&self) -> Period {
        Period::new(year_start(self.lookback_end), self.lookback_end)
    }

    /// Same calendar months, one year earlier
    pub fn prior(&self) -> Period {
        Period::new(year_start(self.prior_year_end), self.prior_year_end)
    }
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn year_start(date: NaiveDate) -> NaiveDate {
    date.with_ordinal(1).unwrap_or(date)
}

/// Last day of `date`'s month: jump to the 28th, step 4 days into the next
/// month, then step back by that day-of-month.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    let day_28 = date.with_day(28).unwrap_or(date);
    let next_month = day_28 + Duration::days(4);
    next_month - Duration::days(next_month.day() as i64)
}

fn previous_month_end(date: NaiveDate) -> NaiveDate {
    month_end(month_start(date) - Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_month_end_every_month() {
        let expected = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
        for (i, last) in expected.iter().enumerate() {
            let month = i as u32 + 1;
            assert_eq!(month_end(d(2024, month, 1)), d(2024, month, *last));
            assert_eq!(month_end(d(2024, month, *last)), d(2024, month, *last));
        }
        assert_eq!(month_end(d(2023, 2, 14)), d(2023, 2, 28));
        assert_eq!(month_end(d(1900, 2, 1)), d(1900, 2, 28));
        assert_eq!(month_end(d(2000, 2, 1)), d(2000, 2, 29));
    }

    #[test]
    fn test_resolve_february_leap_year() {
        let bounds = PeriodBounds::resolve(d(2024, 2, 15));
        assert_eq!(bounds.lookback_start, d(2021, 2, 1));
        assert_eq!(bounds.lookback_end, d(2024, 1, 31));
        assert_eq!(bounds.prior_year_end, d(2023, 1, 31));
    }

    #[test]
    fn test_resolve_after_leap_february() {
        let bounds = PeriodBounds::resolve(d(2024, 3, 15));
        assert_eq!(bounds.lookback_end, d(2024, 2, 29));
        assert_eq!(bounds.prior_year_end, d(2023, 2, 28));

        let bounds = PeriodBounds::resolve(d(2025, 3, 1));
        assert_eq!(bounds.lookback_end, d(2025, 2, 28));
        assert_eq!(bounds.prior_year_end, d(2024, 2, 29));
    }

    #[test]
    fn test_resolve_on_leap_day() {
        let bounds = PeriodBounds::resolve(d(2024, 2, 29));
        assert_eq!(bounds.lookback_start, d(2021, 2, 1));
        assert_eq!(bounds.lookback_end, d(2024, 1, 31));
        assert_eq!(bounds.prior_year_end, d(2023, 1, 31));
    }

    #[test]
    fn test_resolve_across_year_boundary() {
        let bounds = PeriodBounds::resolve(d(2024, 1, 10));
        assert_eq!(bounds.lookback_start, d(2021, 1, 1));
        assert_eq!(bounds.lookback_end, d(2023, 12, 31));
        assert_eq!(bounds.prior_year_end, d(2022, 12, 31));

        assert_eq!(bounds.current(), Period::new(d(2023, 1, 1), d(2023, 12, 31)));
        assert_eq!(bounds.prior(), Period::new(d(2022, 1, 1), d(2022, 12, 31)));
    }

    #[test]
    fn test_windows() {
        let bounds = PeriodBounds::resolve_with(d(2024, 7, 3), 2);
        assert_eq!(bounds.lookback(), Period::new(d(2022, 7, 1), d(2024, 6, 30)));
        assert_eq!(bounds.current(), Period::new(d(2024, 1, 1), d(2024, 6, 30)));
        assert_eq!(bounds.prior(), Period::new(d(2023, 1, 1), d(2023, 6, 30)));
    }

    #[test]
    fn test_fetch_window_covers_prior_year() {
        let bounds = PeriodBounds::resolve_with(d(2024, 7, 3), 1);
        assert_eq!(bounds.lookback(), Period::new(d(2023, 7, 1), d(2024, 6, 30)));
        assert_eq!(bounds.prior(), Period::new(d(2023, 1, 1), d(2023, 6, 30)));
        assert_eq!(bounds.fetch_window(), Period::new(d(2023, 1, 1), d(2024, 6, 30)));

        let bounds = PeriodBounds::resolve(d(2024, 7, 3));
        assert_eq!(bounds.fetch_window(), bounds.lookback());
    }

    #[test]
    fn test_period_contains_is_closed() {
        let p = Period::new(d(2024, 1, 1), d(2024, 1, 31));
        assert!(p.contains(d(2024, 1, 1)));
        assert!(p.contains(d(2024, 1, 31)));
        assert!(!p.contains(d(2024, 2, 1)));
        assert_eq!(p.to_string(), "[2024-01-01, 2024-01-31]");
    }
}
