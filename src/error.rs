//! Error types for validation, querying, aggregation and storage.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReadingError>;

/// failures the core reports to its caller
///
/// every variant carries the offending input so the transport layer can
/// render a message without re-deriving it.
#[derive(Debug, Error)]
pub enum ReadingError {
    #[error("not a valid reading type: {given:?}")]
    InvalidType { given: String },

    #[error("reading value {value} is outside 0..=100")]
    OutOfRange { value: i64 },

    #[error("reading value is not an integer: {given}")]
    NotInteger { given: String },

    #[error("not a valid search selector: {given:?}")]
    UnrecognizedSelector { given: String },

    #[error("invalid date range: {reason}")]
    InvalidRange { reason: String },

    #[error("not a valid reading timestamp: {given}")]
    InvalidTimestamp { given: String },

    #[error("no readings to aggregate{}", device_suffix(.device_id))]
    EmptySet { device_id: Option<String> },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

fn device_suffix(device_id: &Option<String>) -> String {
    match device_id {
        Some(d) => format!(" for device {d}"),
        None => String::new(),
    }
}

/// stable machine codes, used as api error bodies
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidType,
    OutOfRange,
    NotInteger,
    UnrecognizedSelector,
    InvalidRange,
    InvalidTimestamp,
    EmptySet,
    Store,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidType => "NOT_VALID_TYPE",
            ErrorKind::OutOfRange => "READING_OUT_OF_RANGE",
            ErrorKind::NotInteger => "NOT_AN_INTEGER",
            ErrorKind::UnrecognizedSelector => "NOT_VALID_SEARCHING_TYPE",
            ErrorKind::InvalidRange => "NOT_VALID_DATE_RANGE",
            ErrorKind::InvalidTimestamp => "NOT_VALID_TIMESTAMP",
            ErrorKind::EmptySet => "EMPTY_READING_SET",
            ErrorKind::Store => "STORE_ERROR",
        }
    }
}

impl ReadingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReadingError::InvalidType { .. } => ErrorKind::InvalidType,
            ReadingError::OutOfRange { .. } => ErrorKind::OutOfRange,
            ReadingError::NotInteger { .. } => ErrorKind::NotInteger,
            ReadingError::UnrecognizedSelector { .. } => ErrorKind::UnrecognizedSelector,
            ReadingError::InvalidRange { .. } => ErrorKind::InvalidRange,
            ReadingError::InvalidTimestamp { .. } => ErrorKind::InvalidTimestamp,
            ReadingError::EmptySet { .. } => ErrorKind::EmptySet,
            ReadingError::Store(_) => ErrorKind::Store,
        }
    }

    pub(crate) fn empty(device_id: Option<&str>) -> Self {
        ReadingError::EmptySet {
            device_id: device_id.map(str::to_string),
        }
    }
}

/// failures raised by a reading store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("corrupt row: {0}")]
    CorruptRow(String),
}
