//! Trading-day calendar.
//!
//! Produces the sequence of future sessions used to date forecast points:
//! weekends and a fixed exchange holiday list are skipped.

use std::collections::BTreeSet;

use analysis_core::AnalysisError;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Exchange holidays observed in 2025.
pub const MARKET_HOLIDAYS_2025: &[&str] = &[
    "2025-01-01",
    "2025-01-26",
    "2025-03-17",
    "2025-04-14",
    "2025-04-18",
    "2025-05-01",
    "2025-08-15",
    "2025-10-02",
    "2025-10-24",
    "2025-11-12",
    "2025-12-25",
];

/// Finite set of non-trading dates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl HolidayCalendar {
    pub fn new(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    /// Calendar preloaded with [`MARKET_HOLIDAYS_2025`]
    pub fn default_2025() -> Self {
        // Constant list, every entry is a valid ISO date.
        Self::parse_list(&MARKET_HOLIDAYS_2025.join(",")).unwrap_or_default()
    }

    /// Parse a comma separated list of `YYYY-MM-DD` dates. Blank entries are ignored.
    pub fn parse_list(list: &str) -> Result<Self, AnalysisError> {
        let mut holidays = BTreeSet::new();
        for raw in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
                AnalysisError::Configuration(format!("invalid holiday date '{}': {}", raw, e))
            })?;
            holidays.insert(date);
        }
        Ok(Self { holidays })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    pub fn len(&self) -> usize {
        self.holidays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holidays.is_empty()
    }

    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        !is_weekend(date) && !self.contains(date)
    }

    /// First `count` business days on or after `start`
    pub fn next_business_days(&self, start: NaiveDate, count: usize) -> Vec<NaiveDate> {
        next_business_days(start, count, self)
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Walk forward one calendar day at a time from `start` (inclusive) and collect
/// the first `count` dates that are neither a weekend nor a holiday.
///
/// The result is strictly increasing and has exactly `count` elements. Because
/// the holiday set is finite the walk always terminates.
pub fn next_business_days(start: NaiveDate, count: usize, holidays: &HolidayCalendar) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(count);
    let mut current = start;

    while days.len() < count {
        if holidays.is_business_day(current) {
            days.push(current);
        }
        current += Duration::days(1);
    }

    days
}
