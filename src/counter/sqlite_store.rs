//! SQLite-backed durable counter store
//!
//! One row per (partition key, sort key):
//!
//! ```text
//! partition_key  "<second>.<distribution>"
//! sort_key       "<edge_location>.<status_code>"
//! status_count   running count
//! ttl            bucket second + ttl, epoch seconds
//! status_code    denormalized for reads
//! edge_location  denormalized for reads
//! ```
//!
//! Increments are a single `INSERT ... ON CONFLICT DO UPDATE ... RETURNING`
//! statement, so concurrent writers (including other processes sharing the
//! file) never race a read-modify-write.

use super::{CountRow, CounterKey, CounterStore};
use crate::config::validate_identifier;
use crate::error::{EdgeflowError, StoreError};
use crate::sqlite_pragma::apply_optimized_pragmas;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub struct SqliteCounterStore {
    conn: Arc<Mutex<Connection>>,
    table: String,
}

impl SqliteCounterStore {
    /// Open (or create) the counter table in the database at `db_path`
    pub fn open(db_path: impl AsRef<Path>, table: &str) -> Result<Self, EdgeflowError> {
        validate_identifier("EDGEFLOW_TABLE_NAME", table)?;

        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path).map_err(|e| unavailable("open", e))?;
        apply_optimized_pragmas(&conn).map_err(|e| unavailable("configure", e))?;

        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                partition_key TEXT NOT NULL,
                sort_key TEXT NOT NULL,
                status_count INTEGER NOT NULL,
                ttl INTEGER NOT NULL,
                status_code TEXT NOT NULL,
                edge_location TEXT NOT NULL,
                PRIMARY KEY (partition_key, sort_key)
            ) WITHOUT ROWID;
            CREATE INDEX IF NOT EXISTS idx_{table}_ttl ON {table}(ttl);"
        ))
        .map_err(|e| unavailable("create schema", e))?;

        log::info!("✅ SQLite counter store ready: {} (table {})", db_path.display(), table);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Run blocking SQLite work off the async workers
    ///
    /// Every call shares one connection, so calls against the same store run
    /// one at a time; callers fanning out reads only avoid stalling the runtime.
    async fn with_conn<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &str) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        let table = self.table.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("SQLite connection lock poisoned".to_string()))?;
            work(&conn, &table)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("SQLite task failed: {}", e)))?
    }
}

fn unavailable(action: &str, err: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(format!("failed to {} counter database: {}", action, err))
}

#[async_trait]
impl CounterStore for SqliteCounterStore {
    async fn increment(&self, key: &CounterKey, ttl_secs: i64) -> Result<u64, StoreError> {
        let expires_at = key.expires_at(ttl_secs)?;
        let key = key.clone();

        self.with_conn(move |conn, table| {
            let partition_key = key.partition_key();
            let sort_key = key.sort_key();
            let count: i64 = conn
                .query_row(
                    &format!(
                        "INSERT INTO {} (partition_key, sort_key, status_count, ttl, status_code, edge_location)
                         VALUES (?1, ?2, 1, ?3, ?4, ?5)
                         ON CONFLICT(partition_key, sort_key) DO UPDATE SET
                            status_count = status_count + 1,
                            ttl = excluded.ttl,
                            status_code = excluded.status_code,
                            edge_location = excluded.edge_location
                         RETURNING status_count",
                        table
                    ),
                    params![partition_key, sort_key, expires_at, key.status_code, key.edge_location],
                    |row| row.get(0),
                )
                .map_err(|e| {
                    log::error!("❌ Counter upsert failed for {}/{}: {}", partition_key, sort_key, e);
                    StoreError::Write {
                        partition_key: partition_key.clone(),
                        sort_key: sort_key.clone(),
                        source: e.into(),
                    }
                })?;

            log::debug!("{}/{} -> {} (ttl {})", partition_key, sort_key, count, expires_at);
            Ok(count.max(0) as u64)
        })
        .await
    }

    async fn read_bucket(&self, bucket: i64, distribution: &str) -> Result<Vec<CountRow>, StoreError> {
        let partition_key = super::partition_key(bucket, distribution);

        self.with_conn(move |conn, table| {
            let read_error = |e: rusqlite::Error| StoreError::Read {
                partition_key: partition_key.clone(),
                source: e.into(),
            };

            let mut stmt = conn
                .prepare_cached(&format!(
                    "SELECT edge_location, status_code, status_count
                     FROM {} WHERE partition_key = ?1",
                    table
                ))
                .map_err(read_error)?;

            let rows = stmt
                .query_map([&partition_key], |row| {
                    let count: i64 = row.get(2)?;
                    Ok(CountRow {
                        edge_location: row.get(0)?,
                        status_code: row.get(1)?,
                        count: count.max(0) as u64,
                    })
                })
                .map_err(read_error)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(read_error)?;

            Ok(rows)
        })
        .await
    }

    async fn purge_expired(&self, now: i64) -> Result<usize, StoreError> {
        let removed = self
            .with_conn(move |conn, table| {
                conn.execute(&format!("DELETE FROM {} WHERE ttl <= ?1", table), [now])
                    .map_err(|e| unavailable("purge", e))
            })
            .await?;

        if removed > 0 {
            log::info!("🧹 Purged {} expired counters", removed);
        }
        Ok(removed)
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}
