//! Calendar-month keys (`YYYY-MM`) used to index monthly series.

use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Create a month key. `month` is 1-based.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(ForecastError::InvalidMonth(format!("{year}-{month}")));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Parse `YYYY-MM` or a full `YYYY-MM-DD` date (the day is ignored).
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d"))
            .map_err(|_| ForecastError::InvalidMonth(s.to_string()))?;
        Ok(Self {
            year: date.year(),
            month: date.month(),
        })
    }

    /// The month immediately following this one.
    pub fn succ(&self) -> Self {
        self.add_months(1)
    }

    /// Shift by `n` months (may be negative).
    pub fn add_months(&self, n: i64) -> Self {
        let total = self.ordinal() + n;
        Self {
            year: total.div_euclid(12) as i32,
            month: total.rem_euclid(12) as u32 + 1,
        }
    }

    /// Number of months from `self` to `other` (negative if `other` is earlier).
    pub fn months_until(&self, other: &YearMonth) -> i64 {
        other.ordinal() - self.ordinal()
    }

    /// `count` contiguous months starting at `self`.
    pub fn range(&self, count: usize) -> Vec<YearMonth> {
        (0..count as i64).map(|i| self.add_months(i)).collect()
    }

    fn ordinal(&self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// True if every consecutive pair of months is exactly one month apart.
pub fn is_contiguous(months: &[YearMonth]) -> bool {
    months.windows(2).all(|w| w[0].succ() == w[1])
}
