//! Date bounds for cohort() and window() clauses
//!
//! Accepted forms:
//! - `1-Jan-25` (canonical; four-digit years outside 2000-2099)
//! - `2025-01-01` (ISO, normalised to canonical on output)
//! - `-30d`, `-4w`, `-3m`, `-1y` (relative to an as-of date, kept relative)
//!
//! Either side of a `from:to` range may be empty (open bound), but not both.

use std::fmt;
use std::sync::OnceLock;

use chrono::{Datelike, Days, Months, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::errors::{DslError, DslResult};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

type Pattern = OnceLock<Result<Regex, regex::Error>>;

fn compiled(cell: &'static Pattern, pattern: &str) -> DslResult<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(|e| DslError::InvalidDate {
            input: pattern.to_string(),
            reason: e.to_string(),
        })
}

fn short_date_re() -> DslResult<&'static Regex> {
    static RE: Pattern = OnceLock::new();
    compiled(&RE, r"^(\d{1,2})-([A-Za-z]{3})-(\d{2}|\d{4})$")
}

fn iso_date_re() -> DslResult<&'static Regex> {
    static RE: Pattern = OnceLock::new();
    compiled(&RE, r"^\d{4}-\d{2}-\d{2}$")
}

fn relative_re() -> DslResult<&'static Regex> {
    static RE: Pattern = OnceLock::new();
    compiled(&RE, r"^(-?)(\d+)([dwmy])$")
}

/// Unit of a relative offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetUnit {
    Day,
    Week,
    Month,
    Year,
}

impl OffsetUnit {
    fn suffix(&self) -> char {
        match self {
            OffsetUnit::Day => 'd',
            OffsetUnit::Week => 'w',
            OffsetUnit::Month => 'm',
            OffsetUnit::Year => 'y',
        }
    }
}

/// One side of a date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DateBound {
    /// A calendar day
    Absolute { date: NaiveDate },
    /// An offset from the as-of day (negative = past)
    Relative { offset: i64, unit: OffsetUnit },
}

impl DateBound {
    /// Parses a single bound
    pub fn parse(input: &str) -> DslResult<Self> {
        let text = input.trim();

        if let Some(caps) = relative_re()?.captures(text) {
            let magnitude: i64 = caps[2].parse().map_err(|_| DslError::InvalidDate {
                input: text.to_string(),
                reason: "offset out of range".into(),
            })?;
            let offset = if &caps[1] == "-" { -magnitude } else { magnitude };
            let unit = match &caps[3] {
                "d" => OffsetUnit::Day,
                "w" => OffsetUnit::Week,
                "m" => OffsetUnit::Month,
                _ => OffsetUnit::Year,
            };
            return Ok(DateBound::Relative { offset, unit });
        }

        if iso_date_re()?.is_match(text) {
            let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|e| {
                DslError::InvalidDate {
                    input: text.to_string(),
                    reason: e.to_string(),
                }
            })?;
            return Ok(DateBound::Absolute { date });
        }

        if let Some(caps) = short_date_re()?.captures(text) {
            let day: u32 = caps[1].parse().unwrap_or(0);
            let month = MONTHS
                .iter()
                .position(|m| m.eq_ignore_ascii_case(&caps[2]))
                .ok_or_else(|| DslError::InvalidDate {
                    input: text.to_string(),
                    reason: format!("unknown month '{}'", &caps[2]),
                })?;
            let raw_year: i32 = caps[3].parse().unwrap_or(0);
            let year = if caps[3].len() == 2 { 2000 + raw_year } else { raw_year };
            let date = NaiveDate::from_ymd_opt(year, month as u32 + 1, day).ok_or_else(|| {
                DslError::InvalidDate {
                    input: text.to_string(),
                    reason: "no such calendar day".into(),
                }
            })?;
            return Ok(DateBound::Absolute { date });
        }

        Err(DslError::InvalidDate {
            input: text.to_string(),
            reason: "expected d-MMM-yy, YYYY-MM-DD or a relative offset like -30d".into(),
        })
    }

    /// Resolves the bound against an as-of day
    pub fn resolve(&self, as_of: NaiveDate) -> DslResult<NaiveDate> {
        match *self {
            DateBound::Absolute { date } => Ok(date),
            DateBound::Relative { offset, unit } => {
                let resolved = match unit {
                    OffsetUnit::Day => shift_days(as_of, offset),
                    OffsetUnit::Week => shift_days(as_of, offset.saturating_mul(7)),
                    OffsetUnit::Month => shift_months(as_of, offset),
                    OffsetUnit::Year => shift_months(as_of, offset.saturating_mul(12)),
                };
                resolved.ok_or_else(|| DslError::InvalidDate {
                    input: self.to_string(),
                    reason: format!("out of range relative to {}", as_of),
                })
            }
        }
    }
}

fn shift_days(date: NaiveDate, offset: i64) -> Option<NaiveDate> {
    if offset >= 0 {
        date.checked_add_days(Days::new(offset as u64))
    } else {
        date.checked_sub_days(Days::new(offset.unsigned_abs()))
    }
}

fn shift_months(date: NaiveDate, offset: i64) -> Option<NaiveDate> {
    let months = u32::try_from(offset.unsigned_abs()).ok()?;
    if offset >= 0 {
        date.checked_add_months(Months::new(months))
    } else {
        date.checked_sub_months(Months::new(months))
    }
}

impl fmt::Display for DateBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateBound::Absolute { date } => {
                let year = date.year();
                if (2000..=2099).contains(&year) {
                    write!(f, "{}-{}-{:02}", date.day(), MONTHS[date.month0() as usize], year - 2000)
                } else {
                    write!(f, "{}-{}-{:04}", date.day(), MONTHS[date.month0() as usize], year)
                }
            }
            DateBound::Relative { offset, unit } => write!(f, "{}{}", offset, unit.suffix()),
        }
    }
}

/// A `start:end` range; at least one side is present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateBound>,
    pub end: Option<DateBound>,
}

impl DateRange {
    /// Creates a range, rejecting one with both sides open
    pub fn new(start: Option<DateBound>, end: Option<DateBound>) -> DslResult<Self> {
        if start.is_none() && end.is_none() {
            return Err(DslError::InvalidDate {
                input: ":".into(),
                reason: "range needs at least one bound".into(),
            });
        }
        Ok(Self { start, end })
    }

    /// Convenience constructor for two absolute days
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(DateBound::Absolute { date: start }),
            end: Some(DateBound::Absolute { date: end }),
        }
    }

    /// Resolves both sides; an open start stays open, an open end becomes `as_of`
    pub fn resolve(&self, as_of: NaiveDate) -> DslResult<(Option<NaiveDate>, NaiveDate)> {
        let start = self.start.map(|b| b.resolve(as_of)).transpose()?;
        let end = match self.end {
            Some(b) => b.resolve(as_of)?,
            None => as_of,
        };
        Ok((start, end))
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(start) = &self.start {
            write!(f, "{}", start)?;
        }
        write!(f, ":")?;
        if let Some(end) = &self.end {
            write!(f, "{}", end)?;
        }
        Ok(())
    }
}
