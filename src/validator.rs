//! ==============================================================================
//! validator.rs - reading admission rules
//! ==============================================================================
//!
//! purpose:
//!     decides whether a candidate reading may be stored. nothing here touches
//!     the store: the write path calls `admit` and only inserts on `Ok`.
//!
//! rules (checked in this order):
//!     1. type must be exactly "temperature" or "humidity"   -> InvalidType
//!     2. value must convert to an integer                     -> NotInteger
//!     3. value must lie in 0..=100                            -> OutOfRange
//!
//! ==============================================================================

use serde::Deserialize;
use std::fmt;

use crate::domain::{Reading, ReadingType, MAX_VALUE, MIN_VALUE};
use crate::error::{ReadingError, Result};

/// a reading value as it arrives from a client
///
/// json bodies send numbers, html forms send strings. both are accepted as
/// long as they denote a whole number.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Int(i64),
    Float(f64),
    Text(String),
    Other(serde_json::Value),
}

impl RawValue {
    /// integer conversion with the same leniency as a form field:
    /// surrounding whitespace is ignored, "50.0" style floats are not.
    pub fn to_integer(&self) -> Result<i64> {
        match self {
            RawValue::Int(v) => Ok(*v),
            RawValue::Float(f) if f.fract() == 0.0 && fits_i64(*f) => Ok(*f as i64),
            RawValue::Text(s) => s.trim().parse::<i64>().map_err(|_| self.not_integer()),
            _ => Err(self.not_integer()),
        }
    }

    fn not_integer(&self) -> ReadingError {
        ReadingError::NotInteger {
            given: self.to_string(),
        }
    }
}

/// `f as i64` saturates, so anything past the i64 bounds (or NaN) is refused
/// before the cast. 2^63 itself is one past `i64::MAX`.
fn fits_i64(f: f64) -> bool {
    f >= i64::MIN as f64 && f < i64::MAX as f64
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Int(v) => write!(f, "{}", v),
            RawValue::Float(v) => write!(f, "{}", v),
            RawValue::Text(s) => write!(f, "{:?}", s),
            RawValue::Other(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Int(v)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Float(v)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::Text(v.to_string())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        RawValue::Text(v)
    }
}

/// query-time type check
pub fn validate_type(reading_type: &str) -> Result<()> {
    parse_type(reading_type).map(|_| ())
}

pub fn parse_type(reading_type: &str) -> Result<ReadingType> {
    reading_type.parse()
}

/// write-path check; no side effects
pub fn validate_reading(reading_type: &str, value: impl Into<RawValue>) -> Result<()> {
    check(reading_type, &value.into()).map(|_| ())
}

fn check(reading_type: &str, value: &RawValue) -> Result<(ReadingType, i64)> {
    let reading_type = parse_type(reading_type)?;
    let value = value.to_integer()?;
    if !(MIN_VALUE..=MAX_VALUE).contains(&value) {
        return Err(ReadingError::OutOfRange { value });
    }
    Ok((reading_type, value))
}

/// epoch seconds from a client field; `None` when the field is absent,
/// `null` or blank
pub fn parse_timestamp(raw: Option<&RawValue>) -> Result<Option<i64>> {
    let raw = match raw {
        None | Some(RawValue::Other(serde_json::Value::Null)) => return Ok(None),
        Some(RawValue::Text(s)) if s.trim().is_empty() => return Ok(None),
        Some(raw) => raw,
    };
    match raw.to_integer() {
        Ok(at) if at >= 0 => Ok(Some(at)),
        _ => Err(ReadingError::InvalidTimestamp {
            given: raw.to_string(),
        }),
    }
}

/// validate a candidate and build the reading to persist
///
/// `created_at` falls back to `now` when the client sent none. the timestamp
/// is checked after the type and value rules.
pub fn admit(
    device_id: &str,
    reading_type: &str,
    value: &RawValue,
    created_at: Option<&RawValue>,
    now: i64,
) -> Result<Reading> {
    let (reading_type, value) = check(reading_type, value)?;
    let created_at = parse_timestamp(created_at)?.unwrap_or(now);
    Ok(Reading::new(device_id, reading_type, value, created_at))
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rstest::rstest;

    #[test]
    fn accepts_in_range_temperature() {
        assert!(validate_reading("temperature", 50).is_ok());
        assert!(validate_reading("humidity", 0).is_ok());
        assert!(validate_reading("humidity", 100).is_ok());
    }

    #[rstest]
    #[case("pressure", 50)]
    #[case("Temperature", 50)]
    #[case("", 50)]
    #[case("pressure", 500)]
    #[case("HUMIDITY", -3)]
    fn unknown_type_wins_regardless_of_value(#[case] ty: &str, #[case] value: i64) {
        let err = validate_reading(ty, value).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidType);
    }

    #[rstest]
    #[case(-1)]
    #[case(101)]
    #[case(i64::MAX)]
    #[case(i64::MIN)]
    fn out_of_range_values_rejected(#[case] value: i64) {
        let err = validate_reading("temperature", value).unwrap_err();
        assert!(matches!(err, ReadingError::OutOfRange { value: v } if v == value));
    }

    #[rstest]
    #[case(RawValue::from("abc"))]
    #[case(RawValue::from("12.5"))]
    #[case(RawValue::from(12.5))]
    #[case(RawValue::Other(serde_json::Value::Null))]
    #[case(RawValue::Other(serde_json::Value::Bool(true)))]
    #[case(RawValue::from(1e300))]
    #[case(RawValue::from(-1e19))]
    #[case(RawValue::from(f64::NAN))]
    fn non_integers_rejected(#[case] value: RawValue) {
        let err = validate_reading("humidity", value).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotInteger);
    }

    #[test]
    fn string_and_integral_float_values_convert() {
        assert!(validate_reading("humidity", " 42 ").is_ok());
        assert!(validate_reading("humidity", 42.0).is_ok());
        let err = validate_reading("humidity", "101").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn validate_type_ignores_value() {
        assert!(validate_type("temperature").is_ok());
        assert_eq!(validate_type("wind").unwrap_err().kind(), ErrorKind::InvalidType);
    }

    #[test]
    fn raw_value_deserializes_numbers_and_strings() {
        let v: RawValue = serde_json::from_str("7").unwrap();
        assert_eq!(v, RawValue::Int(7));
        let v: RawValue = serde_json::from_str("\"7\"").unwrap();
        assert_eq!(v.to_integer().unwrap(), 7);
        let v: RawValue = serde_json::from_str("[7]").unwrap();
        assert!(v.to_integer().is_err());
    }

    #[test]
    fn admit_defaults_timestamp_to_now() {
        let r = admit("dev", "temperature", &RawValue::Int(20), None, 1_700_000_123).unwrap();
        assert_eq!(r.created_at, 1_700_000_123);
        assert_eq!(r.reading_type, ReadingType::Temperature);

        let r = admit("dev", "temperature", &RawValue::Int(20), Some(&RawValue::Int(5)), 1_700_000_123).unwrap();
        assert_eq!(r.created_at, 5);
    }

    #[test]
    fn admit_rejects_negative_timestamp() {
        let err = admit("dev", "humidity", &RawValue::Int(20), Some(&RawValue::Int(-1)), 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTimestamp);
    }

    #[test]
    fn huge_integral_float_is_not_saturated() {
        let err = RawValue::from(1e300).to_integer().unwrap_err();
        assert!(matches!(err, ReadingError::NotInteger { .. }));
        assert_eq!(RawValue::from(-9.0e18).to_integer().unwrap(), -9_000_000_000_000_000_000);
    }

    #[rstest]
    #[case(None, None)]
    #[case(Some(RawValue::Other(serde_json::Value::Null)), None)]
    #[case(Some(RawValue::from("")), None)]
    #[case(Some(RawValue::from("  ")), None)]
    #[case(Some(RawValue::from("1700000000")), Some(1_700_000_000))]
    #[case(Some(RawValue::from(1_700_000_000.0)), Some(1_700_000_000))]
    #[case(Some(RawValue::Int(0)), Some(0))]
    fn timestamps_from_form_or_json(#[case] raw: Option<RawValue>, #[case] expected: Option<i64>) {
        assert_eq!(parse_timestamp(raw.as_ref()).unwrap(), expected);
    }

    #[rstest]
    #[case(RawValue::from("soon"))]
    #[case(RawValue::from("-5"))]
    #[case(RawValue::from(1.5))]
    #[case(RawValue::Other(serde_json::Value::Bool(false)))]
    fn unusable_timestamps_rejected(#[case] raw: RawValue) {
        let err = parse_timestamp(Some(&raw)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTimestamp);
    }

    #[test]
    fn string_timestamp_is_admitted() {
        let at = RawValue::from("1700000000");
        let r = admit("dev", "humidity", &RawValue::from("55"), Some(&at), 9).unwrap();
        assert_eq!(r.created_at, 1_700_000_000);
        assert_eq!(r.value, 55);
    }

    #[test]
    fn bad_type_reported_before_bad_timestamp() {
        let at = RawValue::from("soon");
        let err = admit("dev", "wind", &RawValue::Int(1), Some(&at), 9).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidType);
    }
}
