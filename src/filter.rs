//! ==============================================================================
//! filter.rs - selection specs and reading predicates
//! ==============================================================================
//!
//! purpose:
//!     turns what a caller asked for (a device, a type, a date range) into a
//!     `Predicate` the store can evaluate. predicates compose with AND, and
//!     render to sql with bound parameters only: user input never becomes
//!     part of the statement text.
//!
//! relationships:
//!     - used by: store.rs (scan), service.rs (selection -> readings), api.rs
//!     - uses: validator.rs (type checks), chrono (day -> epoch bounds)
//!
//! ==============================================================================

use chrono::NaiveDate;
use rusqlite::types::Value as SqlValue;
use serde::Deserialize;

use crate::domain::{Reading, ReadingType};
use crate::error::{ReadingError, Result};
use crate::validator::{parse_type, RawValue};

/// form date format for whole-day searches (e.g. 31/12/2023)
pub const DAY_FORMAT: &str = "%d/%m/%Y";

// ==============================================================================
// date range
// ==============================================================================

/// inclusive `[start, end]` window in epoch seconds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
    pub start: i64,
    pub end: i64,
}

impl DateRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// whole days, utc: start at 00:00:00, end at 23:59:59
    pub fn from_days(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        Ok(Self {
            start: day_at(start, 0, 0, 0)?,
            end: day_at(end, 23, 59, 59)?,
        })
    }

    /// parse two `dd/mm/YYYY` strings into a whole-day range
    pub fn parse_days(start: &str, end: &str) -> Result<Self> {
        Self::from_days(parse_day(start)?, parse_day(end)?)
    }

    pub fn contains(&self, created_at: i64) -> bool {
        self.start <= created_at && created_at <= self.end
    }
}

fn day_at(day: NaiveDate, hour: u32, min: u32, sec: u32) -> Result<i64> {
    day.and_hms_opt(hour, min, sec)
        .map(|dt| dt.and_utc().timestamp())
        .ok_or_else(|| ReadingError::InvalidRange {
            reason: format!("{} has no {:02}:{:02}:{:02}", day, hour, min, sec),
        })
}

fn parse_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DAY_FORMAT).map_err(|e| ReadingError::InvalidRange {
        reason: format!("{:?} is not a dd/mm/YYYY date: {}", s, e),
    })
}

// ==============================================================================
// predicate
// ==============================================================================

/// a filter over stored readings
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Device(String),
    Type(ReadingType),
    CreatedBetween(DateRange),
    /// every inner predicate must match; empty matches everything
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn all() -> Self {
        Predicate::And(Vec::new())
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut parts) => {
                parts.push(other);
                Predicate::And(parts)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    pub fn matches(&self, reading: &Reading) -> bool {
        match self {
            Predicate::Device(id) => reading.device_id == *id,
            Predicate::Type(t) => reading.reading_type == *t,
            Predicate::CreatedBetween(range) => range.contains(reading.created_at),
            Predicate::And(parts) => parts.iter().all(|p| p.matches(reading)),
        }
    }

    /// sql `WHERE` fragment plus the values bound to its `?` placeholders
    pub fn to_sql(&self) -> (String, Vec<SqlValue>) {
        let mut params = Vec::new();
        let clause = self.write_sql(&mut params);
        (clause, params)
    }

    fn write_sql(&self, params: &mut Vec<SqlValue>) -> String {
        match self {
            Predicate::Device(id) => {
                params.push(SqlValue::Text(id.clone()));
                "device_uuid = ?".to_string()
            }
            Predicate::Type(t) => {
                params.push(SqlValue::Text(t.as_str().to_string()));
                "type = ?".to_string()
            }
            Predicate::CreatedBetween(range) => {
                params.push(SqlValue::Integer(range.start));
                params.push(SqlValue::Integer(range.end));
                "date_created >= ? AND date_created <= ?".to_string()
            }
            Predicate::And(parts) if parts.is_empty() => "1 = 1".to_string(),
            Predicate::And(parts) => parts
                .iter()
                .map(|p| format!("({})", p.write_sql(params)))
                .collect::<Vec<_>>()
                .join(" AND "),
        }
    }
}

// ==============================================================================
// selections
// ==============================================================================

/// what the caller asked for, decided at the boundary
#[derive(Clone, Debug, PartialEq)]
pub enum Selection {
    ByDevice(String),
    ByType(ReadingType),
    ByDateRange(DateRange),
}

impl Selection {
    pub fn by_type(reading_type: &str) -> Result<Self> {
        Ok(Selection::ByType(parse_type(reading_type)?))
    }

    pub fn predicate(&self) -> Predicate {
        match self {
            Selection::ByDevice(id) => Predicate::Device(id.clone()),
            Selection::ByType(t) => Predicate::Type(*t),
            Selection::ByDateRange(range) => Predicate::CreatedBetween(*range),
        }
    }

    /// short human label, e.g. for log lines
    pub fn describe(&self) -> String {
        match self {
            Selection::ByDevice(id) => format!("device {}", id),
            Selection::ByType(t) => format!("type {}", t),
            Selection::ByDateRange(r) => format!("range {}..={}", r.start, r.end),
        }
    }
}

/// json body of `POST /custom/search/{option}`
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(rename = "type")]
    pub reading_type: Option<String>,
    pub start_date: Option<RawValue>,
    pub end_date: Option<RawValue>,
}

impl SearchRequest {
    /// `option` is "type" or "range"; range bounds are epoch seconds
    pub fn into_selection(self, option: &str) -> Result<Selection> {
        match option {
            "type" => Selection::by_type(self.reading_type.as_deref().unwrap_or_default()),
            "range" => {
                let start = epoch_bound("start_date", self.start_date.as_ref())?;
                let end = epoch_bound("end_date", self.end_date.as_ref())?;
                Ok(Selection::ByDateRange(DateRange::new(start, end)))
            }
            other => Err(ReadingError::UnrecognizedSelector {
                given: other.to_string(),
            }),
        }
    }
}

fn epoch_bound(field: &str, raw: Option<&RawValue>) -> Result<i64> {
    let raw = raw.ok_or_else(|| ReadingError::InvalidRange {
        reason: format!("missing {}", field),
    })?;
    raw.to_integer().map_err(|_| ReadingError::InvalidRange {
        reason: format!("{} is not an epoch timestamp: {}", field, raw),
    })
}

/// the form flavor of the search: a numeric selector plus day dates
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DaySearchForm {
    /// "0" = by type, "1" = by date range
    pub available_types: Option<String>,
    #[serde(rename = "type")]
    pub reading_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl DaySearchForm {
    pub fn into_selection(self) -> Result<Selection> {
        let selector = self.available_types.unwrap_or_default();
        match selector.trim() {
            "0" => Selection::by_type(self.reading_type.as_deref().unwrap_or_default()),
            "1" => {
                let (start, end) = match (self.start_date, self.end_date) {
                    (Some(s), Some(e)) => (s, e),
                    _ => {
                        return Err(ReadingError::InvalidRange {
                            reason: "start_date and end_date are required".to_string(),
                        })
                    }
                };
                Ok(Selection::ByDateRange(DateRange::parse_days(&start, &end)?))
            }
            other => Err(ReadingError::UnrecognizedSelector {
                given: other.to_string(),
            }),
        }
    }
}
