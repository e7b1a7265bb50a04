//! Ingest-and-Count - split pipeline, first half
//!
//! Reads one stream batch (`{"Records": [{"kinesis": {"data": ...}}]}`) from
//! the file given as the first argument, or stdin, and bumps one durable
//! counter per record.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin ingest_and_count -- batch.json
//! ```
//!
//! ## Environment Variables
//!
//! - EDGEFLOW_DB_PATH - SQLite counter database (default: data/edgeflow.db)
//! - EDGEFLOW_TABLE_NAME - Counter table (default: edge_status_counts)
//! - EDGEFLOW_COUNTER_TTL_SECS - Counter lifetime past its bucket (default: 900)
//! - RUST_LOG - Logging level (optional, default: info)

use edgeflow::{CounterStore, EdgeflowConfig, IngestAndCount, SqliteCounterStore, StreamBatch};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    edgeflow::init_logging();

    let config = EdgeflowConfig::from_env()?;
    log::info!("🚀 Ingest-and-Count");
    log::info!("   ├─ Database: {}", config.db_path.display());
    log::info!("   ├─ Table: {}", config.table_name);
    log::info!("   └─ Counter TTL: {}s", config.counter_ttl_secs);

    let input = edgeflow::read_input(std::env::args().nth(1))?;
    let batch = StreamBatch::from_json(&input)?;

    let store = Arc::new(SqliteCounterStore::open(&config.db_path, &config.table_name)?);
    let handler = IngestAndCount::new(store.clone(), config.counter_ttl_secs);

    if let Err(e) = handler.handle(&batch).await {
        log::error!("❌ Batch of {} records failed: {}", batch.len(), e);
        return Err(e.into());
    }

    // Expiry is not enforced by SQLite itself
    store.purge_expired(chrono::Utc::now().timestamp()).await?;

    Ok(())
}
