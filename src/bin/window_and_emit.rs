//! Window-and-Emit - split pipeline, second half
//!
//! Takes a window request, either as the first argument or on stdin:
//!
//! ```json
//! {"timestamp": "2024-05-01T12:00:00Z", "distribution": "d111.cloudfront.net"}
//! ```
//!
//! rebuilds the trailing window from the counter database and writes one EMF
//! document per metric point.
//!
//! ## Environment Variables
//!
//! - EDGEFLOW_DB_PATH - SQLite counter database (default: data/edgeflow.db)
//! - EDGEFLOW_TABLE_NAME - Counter table (default: edge_status_counts)
//! - EDGEFLOW_WINDOW_SECS - Window width (default: 60)
//! - EDGEFLOW_NAMESPACE_PREFIX - Metric namespace prefix
//! - EDGEFLOW_METRICS_OUTPUT - `-` for stdout or a file to append to
//! - RUST_LOG - Logging level (optional, default: info)

use edgeflow::{EdgeflowConfig, Emitter, SqliteCounterStore, WindowAndEmit, WindowRequest};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    edgeflow::init_logging();

    let config = EdgeflowConfig::from_env()?;

    let input = match std::env::args().nth(1) {
        Some(arg) if arg.trim_start().starts_with('{') => arg,
        other => edgeflow::read_input(other)?,
    };
    let request = WindowRequest::from_json(&input)?;

    log::info!("🚀 Window-and-Emit");
    log::info!("   ├─ Distribution: {}", request.distribution);
    log::info!("   ├─ Database: {}", config.db_path.display());
    log::info!("   └─ Window: {}s", config.window_secs);

    let store = Arc::new(SqliteCounterStore::open(&config.db_path, &config.table_name)?);
    let handler = WindowAndEmit::new(
        store,
        config.window_secs,
        Emitter::new(&config.namespace_prefix),
    );

    let mut sink = edgeflow::open_metrics_sink(&config.metrics_output)?;
    handler.handle(&request, &mut sink).await?;

    Ok(())
}
