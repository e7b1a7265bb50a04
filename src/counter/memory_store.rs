//! In-process counter store
//!
//! Same contract as the SQLite store, held in a mutex-guarded map. Useful for
//! tests and for running both split-pipeline halves inside one process.

use super::{CountRow, CounterKey, CounterStore};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u64,
    expires_at: i64,
}

#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    // partition key -> sort key -> (key, entry)
    partitions: Mutex<HashMap<String, HashMap<String, (CounterKey, Entry)>>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, HashMap<String, (CounterKey, Entry)>>>, StoreError>
    {
        self.partitions
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &CounterKey, ttl_secs: i64) -> Result<u64, StoreError> {
        let expires_at = key.expires_at(ttl_secs)?;
        let mut partitions = self.lock()?;
        let (_, entry) = partitions
            .entry(key.partition_key())
            .or_default()
            .entry(key.sort_key())
            .or_insert_with(|| (key.clone(), Entry { count: 0, expires_at: 0 }));

        entry.count += 1;
        entry.expires_at = expires_at;
        Ok(entry.count)
    }

    async fn read_bucket(&self, bucket: i64, distribution: &str) -> Result<Vec<CountRow>, StoreError> {
        let partitions = self.lock()?;
        let rows = partitions
            .get(&super::partition_key(bucket, distribution))
            .map(|partition| {
                partition
                    .values()
                    .map(|(key, entry)| CountRow {
                        edge_location: key.edge_location.clone(),
                        status_code: key.status_code.clone(),
                        count: entry.count,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    async fn purge_expired(&self, now: i64) -> Result<usize, StoreError> {
        let mut partitions = self.lock()?;
        let mut removed = 0;
        for partition in partitions.values_mut() {
            let before = partition.len();
            partition.retain(|_, (_, entry)| entry.expires_at > now);
            removed += before - partition.len();
        }
        partitions.retain(|_, partition| !partition.is_empty());
        Ok(removed)
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn key(bucket: i64, edge: &str, status: &str) -> CounterKey {
        CounterKey {
            bucket,
            distribution: "d1".to_string(),
            edge_location: edge.to_string(),
            status_code: status.to_string(),
        }
    }

    #[tokio::test]
    async fn test_increment_returns_new_count() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.increment(&key(100, "SFO", "200"), 900).await.unwrap(), 1);
        assert_eq!(store.increment(&key(100, "SFO", "200"), 900).await.unwrap(), 2);
        assert_eq!(store.increment(&key(100, "SFO", "404"), 900).await.unwrap(), 1);

        let mut rows = store.read_bucket(100, "d1").await.unwrap();
        rows.sort_by(|a, b| a.status_code.cmp(&b.status_code));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].count, 2);
        assert_eq!(rows[1].count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_increments() {
        let store = Arc::new(MemoryCounterStore::new());
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.increment(&key(7, "IAD", "200"), 900).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let rows = store.read_bucket(7, "d1").await.unwrap();
        assert_eq!(rows[0].count, 50);
    }

    #[tokio::test]
    async fn test_every_write_refreshes_expiry() {
        let store = MemoryCounterStore::new();
        store.increment(&key(100, "SFO", "200"), 900).await.unwrap();
        store.increment(&key(100, "SFO", "200"), 1200).await.unwrap();

        // expiry moved from 1000 to 1300
        assert_eq!(store.purge_expired(1000).await.unwrap(), 0);
        assert_eq!(store.read_bucket(100, "d1").await.unwrap()[0].count, 2);
        assert_eq!(store.purge_expired(1300).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_expiry_overflow_leaves_store_untouched() {
        let store = MemoryCounterStore::new();
        let err = store.increment(&key(i64::MAX, "SFO", "200"), 900).await.unwrap_err();

        assert!(matches!(err, StoreError::ExpiryOverflow { .. }));
        assert!(store.read_bucket(i64::MAX, "d1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_bucket_is_empty() {
        let store = MemoryCounterStore::new();
        assert!(store.read_bucket(1, "d1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = MemoryCounterStore::new();
        store.increment(&key(100, "SFO", "200"), 900).await.unwrap();
        store.increment(&key(500, "SFO", "200"), 900).await.unwrap();

        assert_eq!(store.purge_expired(1000).await.unwrap(), 1);
        assert!(store.read_bucket(100, "d1").await.unwrap().is_empty());
        assert_eq!(store.read_bucket(500, "d1").await.unwrap().len(), 1);
    }
}
