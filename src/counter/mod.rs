//! Time-bucketed status counters
//!
//! Two shapes of the same counting contract:
//! - durable: [`CounterStore`] implementations keyed by one-second buckets,
//!   shared between the ingest and window invocations
//! - batch: [`BatchCounter`], one invocation's records keyed by minute

pub mod batch;
pub mod memory_store;
pub mod sqlite_store;

pub use batch::BatchCounter;
pub use memory_store::MemoryCounterStore;
pub use sqlite_store::SqliteCounterStore;

use crate::error::StoreError;
use crate::record::LogRecord;
use async_trait::async_trait;

/// Seconds a durable bucket outlives its own timestamp
pub const DEFAULT_TTL_SECS: i64 = 900;

/// Identity of one counted bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CounterKey {
    /// Bucket start in epoch seconds (one second or one minute wide)
    pub bucket: i64,
    pub distribution: String,
    pub edge_location: String,
    pub status_code: String,
}

impl CounterKey {
    /// Durable key: the record's timestamp rounded to the second
    pub fn per_second(record: &LogRecord) -> Self {
        Self {
            bucket: record.second_bucket(),
            distribution: record.distribution.clone(),
            edge_location: record.edge_location.clone(),
            status_code: record.status_code.clone(),
        }
    }

    /// Batch key: the record's timestamp floored to the minute
    pub fn per_minute(record: &LogRecord) -> Self {
        Self {
            bucket: record.minute_bucket(),
            distribution: record.distribution.clone(),
            edge_location: record.edge_location.clone(),
            status_code: record.status_code.clone(),
        }
    }

    /// `"<second>.<distribution>"`
    pub fn partition_key(&self) -> String {
        partition_key(self.bucket, &self.distribution)
    }

    /// `"<edge_location>.<status_code>"`
    pub fn sort_key(&self) -> String {
        format!("{}.{}", self.edge_location, self.status_code)
    }

    /// Epoch second at which this counter may be dropped
    pub fn expires_at(&self, ttl_secs: i64) -> Result<i64, StoreError> {
        self.bucket
            .checked_add(ttl_secs)
            .ok_or(StoreError::ExpiryOverflow {
                bucket: self.bucket,
                ttl_secs,
            })
    }
}

pub fn partition_key(bucket: i64, distribution: &str) -> String {
    format!("{}.{}", bucket, distribution)
}

/// One stored counter as returned by a bucket read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountRow {
    pub edge_location: String,
    pub status_code: String,
    pub count: u64,
}

/// Durable counter store with atomic increment-on-upsert
///
/// Implementations must serialize concurrent increments of the same key
/// themselves; callers never lock around them.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Add one to `key`, create it if absent, set its expiry to
    /// `key.bucket + ttl_secs`, and return the new count
    async fn increment(&self, key: &CounterKey, ttl_secs: i64) -> Result<u64, StoreError>;

    /// Every counter stored for one second of one distribution
    async fn read_bucket(&self, bucket: i64, distribution: &str) -> Result<Vec<CountRow>, StoreError>;

    /// Drop counters whose expiry is at or before `now`, returning how many went
    async fn purge_expired(&self, now: i64) -> Result<usize, StoreError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}
