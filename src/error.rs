//! Error kinds for the aggregation engine
//!
//! Each failure keeps its cause as a `source` so the full chain reaches the
//! logs of the invoking trigger. Nothing here retries: errors are logged by
//! the component that hit them and handed back to the caller.

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type EdgeflowResult<T> = Result<T, EdgeflowError>;

/// A stream payload that could not be turned into a log record
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("expected {expected} tab-separated fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("timestamp field {value:?} is not numeric")]
    Timestamp {
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },

    #[error("timestamp field {0:?} is not a finite number")]
    NonFiniteTimestamp(String),

    #[error("timestamp {0} is outside the representable date range")]
    TimestampOutOfRange(f64),

    #[error("malformed stream batch: {0}")]
    Envelope(#[from] serde_json::Error),
}

/// Failures talking to the durable counter store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("counter upsert failed for {partition_key}/{sort_key}")]
    Write {
        partition_key: String,
        sort_key: String,
        #[source]
        source: BoxError,
    },

    #[error("bucket read failed for {partition_key}")]
    Read {
        partition_key: String,
        #[source]
        source: BoxError,
    },

    #[error("expiry overflows for bucket {bucket} with ttl {ttl_secs}s")]
    ExpiryOverflow { bucket: i64, ttl_secs: i64 },

    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

/// A metric point the sink refused
#[derive(Debug, Error)]
#[error("failed to write metric {metric} to {namespace}")]
pub struct SinkError {
    pub namespace: String,
    pub metric: String,
    #[source]
    pub source: BoxError,
}

/// A window request that could not be understood
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("malformed window request: {0}")]
    Json(#[from] serde_json::Error),

    #[error("window timestamp {value:?} is not YYYY-MM-DDTHH:MM:SSZ")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a plain SQL identifier, got {value:?}")]
    InvalidIdentifier { name: &'static str, value: String },

    #[error("{name} must be a positive integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum EdgeflowError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
