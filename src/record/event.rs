//! Stream delivery envelope
//!
//! A trigger delivers records in batches shaped like
//! `{"Records": [{"kinesis": {"data": "<base64>"}}]}`. Anything else on the
//! envelope (sequence numbers, shard ids) is ignored.

use super::LogRecord;
use crate::error::ParseError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamBatch {
    #[serde(rename = "Records", default)]
    pub records: Vec<StreamRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRecord {
    pub kinesis: StreamPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamPayload {
    pub data: String,
}

impl StreamBatch {
    pub fn from_json(input: &str) -> Result<Self, ParseError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Build a batch from plain log lines (used by tests and local runs)
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine as _;

        Self {
            records: lines
                .into_iter()
                .map(|line| StreamRecord {
                    kinesis: StreamPayload {
                        data: STANDARD.encode(line.as_bytes()),
                    },
                })
                .collect(),
        }
    }

    /// Parse every record, failing on the first malformed one
    pub fn parse_records(&self) -> Result<Vec<LogRecord>, ParseError> {
        self.records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                LogRecord::from_payload(&record.kinesis.data).inspect_err(|e| {
                    log::error!("Rejecting stream record #{}: {}", index, e);
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kinesis_envelope() {
        let json = r#"{"Records":[
            {"kinesis":{"kinesisSchemaVersion":"1.0","partitionKey":"p","data":"MTAuMAkxLjEuMS4xCTIwMAlkMQlJQUQK"},"eventSource":"aws:kinesis"}
        ]}"#;

        let batch = StreamBatch::from_json(json).unwrap();
        assert_eq!(batch.len(), 1);

        let records = batch.parse_records().unwrap();
        assert_eq!(records[0].timestamp, 10.0);
        assert_eq!(records[0].client_ip, "1.1.1.1");
        assert_eq!(records[0].status_code, "200");
        assert_eq!(records[0].distribution, "d1");
        assert_eq!(records[0].edge_location, "IAD");
    }

    #[test]
    fn test_missing_records_is_empty_batch() {
        let batch = StreamBatch::from_json("{}").unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_malformed_envelope() {
        assert!(matches!(
            StreamBatch::from_json(r#"{"Records": [{"kinesis": {}}]}"#),
            Err(ParseError::Envelope(_))
        ));
    }

    #[test]
    fn test_one_bad_record_fails_batch() {
        let batch = StreamBatch::from_lines([
            "10.0\t1.1.1.1\t200\td1\tIAD",
            "10.4\t2.2.2.2\t200\td1",
        ]);

        assert!(matches!(
            batch.parse_records(),
            Err(ParseError::FieldCount { found: 4, .. })
        ));
    }
}
