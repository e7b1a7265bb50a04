//! Aggregation scopes
//!
//! The split pipeline rebuilds a trailing window from one-second buckets in
//! the durable store; the batch pipeline takes its scopes straight from the
//! in-memory counter.

use crate::counter::{BatchCounter, CountRow, CounterStore};
use crate::error::{RequestError, StoreError};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::task::JoinSet;

/// One-second buckets read per window
pub const DEFAULT_WINDOW_SECS: i64 = 60;

const REQUEST_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Request to emit the window ending at `timestamp` for one distribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRequest {
    pub timestamp: DateTime<Utc>,
    pub distribution: String,
}

#[derive(Deserialize)]
struct RawWindowRequest {
    timestamp: String,
    distribution: String,
}

impl WindowRequest {
    /// Parse `{"timestamp": "2024-01-01T00:01:00Z", "distribution": "..."}`
    pub fn from_json(input: &str) -> Result<Self, RequestError> {
        let raw: RawWindowRequest = serde_json::from_str(input)?;
        let naive = NaiveDateTime::parse_from_str(&raw.timestamp, REQUEST_TIMESTAMP_FORMAT)
            .map_err(|source| RequestError::Timestamp {
                value: raw.timestamp.clone(),
                source,
            })?;

        Ok(Self {
            timestamp: Utc.from_utc_datetime(&naive),
            distribution: raw.distribution,
        })
    }

    pub fn end_second(&self) -> i64 {
        self.timestamp.timestamp()
    }
}

/// The rows aggregated into one emission
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationScope {
    pub distribution: String,
    /// Timestamp every emitted point carries, epoch seconds
    pub timestamp: i64,
    pub rows: Vec<CountRow>,
}

impl AggregationScope {
    pub fn new(distribution: impl Into<String>, timestamp: i64) -> Self {
        Self {
            distribution: distribution.into(),
            timestamp,
            rows: Vec::new(),
        }
    }

    pub fn total(&self) -> u64 {
        self.rows.iter().map(|row| row.count).sum()
    }
}

/// Read the `window_secs` one-second buckets ending at `end_second`
/// (`end_second - window_secs + 1 ..= end_second`) and pool their rows
///
/// Reads are issued concurrently, and a store backed by a single connection
/// still serves them one at a time. Empty buckets contribute nothing; the
/// first failed read aborts the rest and no partial scope is returned.
pub async fn reconstruct_window(
    store: Arc<dyn CounterStore>,
    distribution: &str,
    end_second: i64,
    window_secs: i64,
) -> Result<AggregationScope, StoreError> {
    let first_second = end_second - window_secs + 1;
    let mut reads = JoinSet::new();

    for second in first_second..=end_second {
        let store = store.clone();
        let distribution = distribution.to_string();
        reads.spawn(async move {
            let rows = store.read_bucket(second, &distribution).await;
            (second, rows)
        });
    }

    let mut scope = AggregationScope::new(distribution, end_second);
    while let Some(joined) = reads.join_next().await {
        let (second, rows) = joined.map_err(|e| {
            log::error!("❌ Bucket read task for {} failed: {}", distribution, e);
            StoreError::Unavailable(format!("bucket read task failed: {}", e))
        })?;

        match rows {
            Ok(rows) => {
                log::debug!("Bucket {}.{}: {} rows", second, distribution, rows.len());
                scope.rows.extend(rows);
            }
            Err(e) => {
                log::error!(
                    "❌ Window {} for {} aborted at bucket {}: {}",
                    end_second,
                    distribution,
                    second,
                    e
                );
                reads.abort_all();
                return Err(e);
            }
        }
    }

    // Completion order is arbitrary; keep the scope stable for logging
    scope
        .rows
        .sort_by(|a, b| (&a.edge_location, &a.status_code).cmp(&(&b.edge_location, &b.status_code)));

    log::info!(
        "🪟 Window {}..={} for {}: {} rows, {} requests",
        first_second,
        end_second,
        distribution,
        scope.rows.len(),
        scope.total()
    );
    Ok(scope)
}

/// One scope per (distribution, minute) present in the batch
pub fn batch_scopes(counter: &BatchCounter) -> Vec<AggregationScope> {
    counter
        .scopes()
        .into_iter()
        .map(|((distribution, minute), rows)| AggregationScope {
            distribution,
            timestamp: minute,
            rows,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::{CounterKey, MemoryCounterStore};
    use async_trait::async_trait;

    fn key(bucket: i64, edge: &str, status: &str) -> CounterKey {
        CounterKey {
            bucket,
            distribution: "d1".to_string(),
            edge_location: edge.to_string(),
            status_code: status.to_string(),
        }
    }

    #[test]
    fn test_parse_window_request() {
        let request =
            WindowRequest::from_json(r#"{"timestamp": "1970-01-01T00:02:40Z", "distribution": "d1"}"#)
                .unwrap();
        assert_eq!(request.end_second(), 160);
        assert_eq!(request.distribution, "d1");
    }

    #[test]
    fn test_bad_window_request() {
        assert!(matches!(
            WindowRequest::from_json(r#"{"timestamp": "1970-01-01 00:02:40", "distribution": "d1"}"#),
            Err(RequestError::Timestamp { .. })
        ));
        assert!(matches!(
            WindowRequest::from_json(r#"{"distribution": "d1"}"#),
            Err(RequestError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_window_sums_all_sixty_buckets() {
        let store = Arc::new(MemoryCounterStore::new());
        let mut expected = 0;
        // buckets 1000..=1059, bucket i gets (i % 3) hits, so some stay empty
        for second in 1000..1060 {
            for _ in 0..(second % 3) {
                store.increment(&key(second, "IAD", "200"), 900).await.unwrap();
                expected += 1;
            }
        }
        // outside the window on both sides
        store.increment(&key(999, "IAD", "200"), 900).await.unwrap();
        store.increment(&key(1060, "IAD", "200"), 900).await.unwrap();

        let scope = reconstruct_window(store, "d1", 1059, 60).await.unwrap();
        assert_eq!(scope.total(), expected);
        assert_eq!(scope.timestamp, 1059);
    }

    #[tokio::test]
    async fn test_empty_window() {
        let store = Arc::new(MemoryCounterStore::new());
        let scope = reconstruct_window(store, "d1", 500, 60).await.unwrap();
        assert!(scope.rows.is_empty());
        assert_eq!(scope.total(), 0);
    }

    struct FailingStore {
        fail_at: i64,
    }

    #[async_trait]
    impl CounterStore for FailingStore {
        async fn increment(&self, _key: &CounterKey, _ttl: i64) -> Result<u64, StoreError> {
            Ok(1)
        }

        async fn read_bucket(&self, bucket: i64, distribution: &str) -> Result<Vec<CountRow>, StoreError> {
            if bucket == self.fail_at {
                return Err(StoreError::Read {
                    partition_key: format!("{}.{}", bucket, distribution),
                    source: "throttled".into(),
                });
            }
            Ok(vec![CountRow {
                edge_location: "IAD".to_string(),
                status_code: "200".to_string(),
                count: 1,
            }])
        }

        async fn purge_expired(&self, _now: i64) -> Result<usize, StoreError> {
            Ok(0)
        }

        fn backend_type(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_failed_read_aborts_window() {
        let store = Arc::new(FailingStore { fail_at: 130 });
        let err = reconstruct_window(store, "d1", 160, 60).await.unwrap_err();
        assert!(matches!(err, StoreError::Read { ref partition_key, .. } if partition_key == "130.d1"));
    }

    #[test]
    fn test_batch_scopes() {
        let mut counter = BatchCounter::new();
        for line in [
            "10.0\t1.1.1.1\t200\td1\tIAD",
            "70.0\t1.1.1.1\t200\td1\tIAD",
            "71.0\t1.1.1.1\t404\td1\tSFO",
        ] {
            counter.add(&crate::record::LogRecord::parse_line(line).unwrap());
        }

        let scopes = batch_scopes(&counter);
        assert_eq!(scopes.len(), 2);
        assert_eq!(scopes[0].timestamp, 0);
        assert_eq!(scopes[1].timestamp, 60);
        assert_eq!(scopes[1].total(), 2);
    }
}
