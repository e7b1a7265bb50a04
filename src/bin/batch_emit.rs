//! Batch emitter - the single-invocation pipeline
//!
//! Reads one stream batch from the file given as the first argument, or
//! stdin, aggregates it in memory per (distribution, minute, edge location)
//! and writes EMF documents for every summary.
//!
//! ## Environment Variables
//!
//! - EDGEFLOW_NAMESPACE_PREFIX - Metric namespace prefix
//! - EDGEFLOW_METRICS_OUTPUT - `-` for stdout or a file to append to
//! - RUST_LOG - Logging level (optional, default: info)

use edgeflow::{BatchPipeline, EdgeflowConfig, Emitter, StreamBatch};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    edgeflow::init_logging();

    let config = EdgeflowConfig::from_env()?;

    let input = edgeflow::read_input(std::env::args().nth(1))?;
    let batch = StreamBatch::from_json(&input)?;
    log::info!("🚀 Batch emitter: {} records", batch.len());

    let pipeline = BatchPipeline::new(Emitter::new(&config.namespace_prefix));
    let mut sink = edgeflow::open_metrics_sink(&config.metrics_output)?;
    pipeline.handle(&batch, &mut sink).await?;

    Ok(())
}
