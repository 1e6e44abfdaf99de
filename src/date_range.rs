// =============================================================================
// DateRange: validated inclusive calendar-date bounds
// =============================================================================
//
// User input is month/day/year separated by '/', e.g. "7/3/2014". Leading
// zeros are accepted. There is no time-of-day component.
// =============================================================================

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

const DELIMITER: char = '/';

/// Why a start/end pair was rejected. All variants are detected before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateRangeError {
    #[error("'{input}' is not a date in Month/Day/Year form (ex. 7/3/2014)")]
    InvalidDateFormat { input: String },

    #[error("'{input}' is not a real calendar date")]
    InvalidDateValue { input: String },

    #[error("start date {start} is after end date {end}")]
    RangeOrderError { start: NaiveDate, end: NaiveDate },
}

/// Inclusive `[start, end]` calendar range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Parse and validate a start/end pair of `M/D/YYYY` strings.
    pub fn parse(start_text: &str, end_text: &str) -> Result<Self, DateRangeError> {
        let start = parse_date(start_text)?;
        let end = parse_date(end_text)?;
        Self::new(start, end)
    }

    /// Build from already-valid dates, enforcing the ordering invariant.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if start > end {
            return Err(DateRangeError::RangeOrderError { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of calendar days covered, counting both ends.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", mdy(self.start), mdy(self.end))
    }
}

fn mdy(date: NaiveDate) -> String {
    format!("{}/{}/{}", date.month(), date.day(), date.year())
}

/// Parse one `M/D/YYYY` token triple.
///
/// Tokens must all be integers; out-of-range integers (month 13, day 31 of
/// April, a negative month) are value errors rather than format errors.
pub fn parse_date(text: &str) -> Result<NaiveDate, DateRangeError> {
    let trimmed = text.trim();
    let format_err = || DateRangeError::InvalidDateFormat {
        input: trimmed.to_string(),
    };
    let value_err = || DateRangeError::InvalidDateValue {
        input: trimmed.to_string(),
    };

    let tokens: Vec<&str> = trimmed.split(DELIMITER).collect();
    let &[month, day, year] = tokens.as_slice() else {
        return Err(format_err());
    };

    let parse_int = |tok: &str| tok.trim().parse::<i64>().map_err(|_| format_err());
    let (month, day, year) = (parse_int(month)?, parse_int(day)?, parse_int(year)?);

    let month = u32::try_from(month).map_err(|_| value_err())?;
    let day = u32::try_from(day).map_err(|_| value_err())?;
    let year = i32::try_from(year).map_err(|_| value_err())?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(value_err)
}
