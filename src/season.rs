//! Per-year seasonal composites.

use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::ConfigError,
    expr::{DateRange, Image, ImageCollection},
};

/// Metadata key holding the composite's year.
pub const YEAR_PROPERTY: &str = "year";

/// Metadata key holding the composite's timestamp in milliseconds since epoch.
pub const TIME_START_PROPERTY: &str = "system:time_start";

/// A calendar day without a year. Serialised as `"MM-DD"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    pub fn new(month: u32, day: u32) -> Result<Self, ConfigError> {
        // 2000 is a leap year, so 02-29 is accepted here and checked per year.
        NaiveDate::from_ymd_opt(2000, month, day)
            .map(|_| MonthDay { month, day })
            .ok_or(ConfigError::InvalidMonthDay { month, day })
    }

    fn in_year(&self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
    }
}

impl TryFrom<String> for MonthDay {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let invalid = || ConfigError::MalformedMonthDay(s.clone());
        let (m, d) = s.split_once('-').ok_or_else(invalid)?;
        let month = m.trim().parse().map_err(|_| invalid())?;
        let day = d.trim().parse().map_err(|_| invalid())?;

        MonthDay::new(month, day)
    }
}

impl From<MonthDay> for String {
    fn from(md: MonthDay) -> Self {
        md.to_string()
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

/// Fixed intra-year window. `end` is exclusive; when it does not come after
/// `start` within a year, the window runs into the following year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonWindow {
    pub start: MonthDay,
    pub end: MonthDay,
}

impl SeasonWindow {
    pub fn new(start: MonthDay, end: MonthDay) -> Self {
        SeasonWindow { start, end }
    }

    /// March, April and May.
    pub fn mam() -> Self {
        SeasonWindow {
            start: MonthDay { month: 3, day: 1 },
            end: MonthDay { month: 6, day: 1 },
        }
    }

    pub fn wraps(&self) -> bool {
        self.end <= self.start
    }

    pub fn for_year(&self, year: i32) -> Result<YearWindow, ConfigError> {
        let invalid = || ConfigError::InvalidSeasonYear {
            start: self.start.to_string(),
            end: self.end.to_string(),
            year,
        };
        let end_year = if self.wraps() {
            year.checked_add(1).ok_or_else(invalid)?
        } else {
            year
        };

        let start = self.start.in_year(year).ok_or_else(invalid)?;
        let end = self.end.in_year(end_year).ok_or_else(invalid)?;
        let range = DateRange::new(start, end)?;

        Ok(YearWindow { year, range })
    }
}

impl fmt::Display for SeasonWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Inclusive range of years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub first: i32,
    pub last: i32,
}

impl YearRange {
    pub fn new(first: i32, last: i32) -> Result<Self, ConfigError> {
        // Both ends, and the year after a wrapping season, must be dates chrono can hold.
        let representable = |y: i32| {
            y.checked_add(1)
                .and_then(|next| NaiveDate::from_ymd_opt(next, 1, 1))
                .is_some()
        };
        if first > last || !representable(first) || !representable(last) {
            return Err(ConfigError::InvalidYearRange { first, last });
        }

        Ok(YearRange { first, last })
    }

    pub fn len(&self) -> usize {
        (i64::from(self.last) - i64::from(self.first) + 1).max(0) as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> {
        self.first..=self.last
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearWindow {
    pub year: i32,
    pub range: DateRange,
}

impl YearWindow {
    pub fn start_millis(&self) -> i64 {
        self.range
            .start
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp_millis()
    }
}

/// Resolves the window of every year up front, so a season that cannot exist
/// in some year fails before anything is built.
pub fn year_windows(years: YearRange, window: &SeasonWindow) -> Result<Vec<YearWindow>, ConfigError> {
    years.iter().map(|y| window.for_year(y)).collect()
}

/// Builds one summed composite per year, tagged with its year and window start.
pub fn seasonal_composites(
    collection: &ImageCollection,
    years: YearRange,
    window: &SeasonWindow,
) -> Result<Vec<Image>, ConfigError> {
    let mut composites = Vec::with_capacity(years.len());

    for year_window in year_windows(years, window)? {
        debug!(year = year_window.year, range = %year_window.range, "seasonal composite");
        let composite = collection
            .filter_date(year_window.range)
            .sum()
            .set(YEAR_PROPERTY, year_window.year)
            .set(TIME_START_PROPERTY, year_window.start_millis());
        composites.push(composite);
    }

    if composites.len() != years.len() {
        return Err(ConfigError::IncompleteYears {
            expected: years.len(),
            actual: composites.len(),
        });
    }

    Ok(composites)
}

// -- Tests -------------------------------------------------------------------
