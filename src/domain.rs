//! ==============================================================================
//! domain.rs - readings data model
//! ==============================================================================
//!
//! purpose:
//!     the records that flow through the validator, the store and the
//!     aggregation engine. serde names follow the json surface the api has
//!     always spoken (device_uuid / date_created), not the rust field names.
//!
//! ==============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ReadingError;

/// wire spelling of the temperature type
pub const TEMPERATURE: &str = "temperature";
/// wire spelling of the humidity type
pub const HUMIDITY: &str = "humidity";

/// inclusive bounds for an admissible reading value
pub const MIN_VALUE: i64 = 0;
pub const MAX_VALUE: i64 = 100;

/// the two kinds of reading a device can report
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingType {
    Temperature,
    Humidity,
}

impl ReadingType {
    pub const ALL: [ReadingType; 2] = [ReadingType::Temperature, ReadingType::Humidity];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingType::Temperature => TEMPERATURE,
            ReadingType::Humidity => HUMIDITY,
        }
    }
}

impl fmt::Display for ReadingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// exact match only: "Temperature" or " humidity" are not types
impl FromStr for ReadingType {
    type Err = ReadingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            TEMPERATURE => Ok(ReadingType::Temperature),
            HUMIDITY => Ok(ReadingType::Humidity),
            other => Err(ReadingError::InvalidType {
                given: other.to_string(),
            }),
        }
    }
}

/// one stored observation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    /// opaque device identifier (never validated for format)
    #[serde(rename = "device_uuid")]
    pub device_id: String,

    #[serde(rename = "type")]
    pub reading_type: ReadingType,

    /// 0-100 when written through the validator
    pub value: i64,

    /// epoch seconds, client supplied or stamped at admission
    #[serde(rename = "date_created")]
    pub created_at: i64,
}

impl Reading {
    pub fn new(
        device_id: impl Into<String>,
        reading_type: ReadingType,
        value: i64,
        created_at: i64,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            reading_type,
            value,
            created_at,
        }
    }
}

/// aggregate statistics for one device, computed per request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceSummary {
    #[serde(rename = "device_uuid")]
    pub device_id: String,
    #[serde(rename = "number_of_readings")]
    pub count: usize,
    #[serde(rename = "max_reading_value")]
    pub max: i64,
    /// high-median scalar
    #[serde(rename = "median_reading_value")]
    pub median: i64,
    #[serde(rename = "mean_reading_value")]
    pub mean: f64,
    #[serde(rename = "quartile_1_value")]
    pub quartile_1: f64,
    #[serde(rename = "quartile_3_value")]
    pub quartile_3: f64,
}

/// first and third quartile of a value set
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quartiles {
    pub quartile_1: f64,
    pub quartile_3: f64,
}
