//! Access-log record parsing
//!
//! One stream event carries one CDN real-time log line:
//! `timestamp \t client_ip \t status_code \t distribution \t edge_location`

pub mod event;

pub use event::{StreamBatch, StreamRecord};

use crate::error::ParseError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};

const FIELD_COUNT: usize = 5;

/// Accepted timestamps stay a minute inside chrono's range, so every bucket
/// derived from them is a representable instant
fn timestamp_in_range(timestamp: f64) -> bool {
    let earliest = (DateTime::<Utc>::MIN_UTC.timestamp() + 60) as f64;
    let latest = (DateTime::<Utc>::MAX_UTC.timestamp() - 60) as f64;
    (earliest..=latest).contains(&timestamp)
}

/// One parsed access-log line
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Seconds since the epoch, sub-second precision
    pub timestamp: f64,
    pub client_ip: String,
    /// Three-digit HTTP status, kept as text
    pub status_code: String,
    pub distribution: String,
    pub edge_location: String,
}

impl LogRecord {
    /// Parse a decoded log line
    pub fn parse_line(line: &str) -> Result<Self, ParseError> {
        let fields: Vec<&str> = line.trim().split('\t').collect();
        if fields.len() != FIELD_COUNT {
            return Err(ParseError::FieldCount {
                expected: FIELD_COUNT,
                found: fields.len(),
            });
        }

        let timestamp = fields[0]
            .parse::<f64>()
            .map_err(|source| ParseError::Timestamp {
                value: fields[0].to_string(),
                source,
            })?;
        // "NaN" and "inf" parse as f64 but are not timestamps
        if !timestamp.is_finite() {
            return Err(ParseError::NonFiniteTimestamp(fields[0].to_string()));
        }
        if !timestamp_in_range(timestamp) {
            return Err(ParseError::TimestampOutOfRange(timestamp));
        }

        Ok(Self {
            timestamp,
            client_ip: fields[1].to_string(),
            status_code: fields[2].to_string(),
            distribution: fields[3].to_string(),
            edge_location: fields[4].to_string(),
        })
    }

    /// Decode a base64 transport payload and parse it
    pub fn from_payload(data: &str) -> Result<Self, ParseError> {
        let raw = STANDARD.decode(data.trim())?;
        let line = String::from_utf8(raw)?;
        Self::parse_line(&line)
    }

    /// Whole-second bucket used by the durable counters (round half to even)
    pub fn second_bucket(&self) -> i64 {
        self.timestamp.round_ties_even() as i64
    }

    /// Start of the 60-second minute containing this record
    pub fn minute_bucket(&self) -> i64 {
        ((self.timestamp / 60.0).floor() as i64) * 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(line: &str) -> String {
        STANDARD.encode(line.as_bytes())
    }

    #[test]
    fn test_parse_line() {
        let record =
            LogRecord::parse_line("1700000000.123\t10.0.0.1\t404\td111.cloudfront.net\tIAD89-C1\n")
                .unwrap();

        assert_eq!(record.timestamp, 1700000000.123);
        assert_eq!(record.client_ip, "10.0.0.1");
        assert_eq!(record.status_code, "404");
        assert_eq!(record.distribution, "d111.cloudfront.net");
        assert_eq!(record.edge_location, "IAD89-C1");
    }

    #[test]
    fn test_from_payload() {
        let record = LogRecord::from_payload(&encode("10.4\t2.2.2.2\t200\td1\tIAD\n")).unwrap();
        assert_eq!(record.timestamp, 10.4);
        assert_eq!(record.edge_location, "IAD");
    }

    #[test]
    fn test_four_fields_is_parse_error() {
        let err = LogRecord::from_payload(&encode("10.0\t1.1.1.1\t200\td1")).unwrap_err();
        assert!(matches!(err, ParseError::FieldCount { expected: 5, found: 4 }));
    }

    #[test]
    fn test_six_fields_is_parse_error() {
        let err = LogRecord::parse_line("10.0\t1.1.1.1\t200\td1\tIAD\textra").unwrap_err();
        assert!(matches!(err, ParseError::FieldCount { found: 6, .. }));
    }

    #[test]
    fn test_non_numeric_timestamp() {
        let err = LogRecord::parse_line("yesterday\t1.1.1.1\t200\td1\tIAD").unwrap_err();
        assert!(matches!(err, ParseError::Timestamp { .. }));

        let err = LogRecord::parse_line("NaN\t1.1.1.1\t200\td1\tIAD").unwrap_err();
        assert!(matches!(err, ParseError::NonFiniteTimestamp(_)));
    }

    #[test]
    fn test_timestamp_out_of_range() {
        let err = LogRecord::parse_line("1e300\t1.1.1.1\t200\td1\tIAD").unwrap_err();
        assert!(matches!(err, ParseError::TimestampOutOfRange(t) if t == 1e300));

        let err = LogRecord::parse_line("-1e18\t1.1.1.1\t200\td1\tIAD").unwrap_err();
        assert!(matches!(err, ParseError::TimestampOutOfRange(_)));

        // far future but still a real date
        let record = LogRecord::parse_line("253402300799\t1.1.1.1\t200\td1\tIAD").unwrap();
        assert_eq!(record.minute_bucket(), 253402300740);
    }

    #[test]
    fn test_invalid_base64() {
        let err = LogRecord::from_payload("%%% not base64").unwrap_err();
        assert!(matches!(err, ParseError::Base64(_)));
    }

    #[test]
    fn test_invalid_utf8() {
        let err = LogRecord::from_payload(&STANDARD.encode([0xff, 0xfe, 0x09])).unwrap_err();
        assert!(matches!(err, ParseError::Utf8(_)));
    }

    #[test]
    fn test_buckets() {
        let record = LogRecord::parse_line("119.6\t1.1.1.1\t200\td1\tIAD").unwrap();
        assert_eq!(record.second_bucket(), 120);
        assert_eq!(record.minute_bucket(), 60);

        let half = LogRecord::parse_line("100.5\t1.1.1.1\t200\td1\tIAD").unwrap();
        assert_eq!(half.second_bucket(), 100);
    }
}
