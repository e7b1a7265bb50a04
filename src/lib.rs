//! Edgeflow - CDN access-log status aggregation
//!
//! Turns per-request CDN real-time log records into per-edge-location status
//! metrics (request count, 2xx/4xx/5xx counts and percentages).
//!
//! # Architecture
//!
//! ```text
//! StreamBatch → LogRecord (record)
//!     ↓
//! CounterStore / BatchCounter (counter)
//!     ↓
//! AggregationScope (window)
//!     ↓
//! EdgeLocationSummary (aggregate)
//!     ↓
//! Emitter → MetricsSink (emit)
//! ```
//!
//! The `pipeline` module wires these into the split (count now, window later)
//! and batch (all in memory) shapes.

pub mod aggregate;
pub mod config;
pub mod counter;
pub mod emit;
pub mod error;
pub mod pipeline;
pub mod record;
pub mod sqlite_pragma;
pub mod window;

pub use aggregate::{summarize, EdgeLocationSummary, StatusClass};
pub use config::{EdgeflowConfig, MetricsOutput};
pub use counter::{BatchCounter, CountRow, CounterKey, CounterStore, MemoryCounterStore, SqliteCounterStore};
pub use emit::{EmfSink, Emitter, MetricPoint, MetricsSink, RecordingSink};
pub use error::{EdgeflowError, EdgeflowResult};
pub use pipeline::{BatchPipeline, EmitReport, IngestAndCount, WindowAndEmit};
pub use record::{LogRecord, StreamBatch};
pub use window::{reconstruct_window, AggregationScope, WindowRequest};

use std::io::{Read, Write};

/// Read a binary's input: the file named by the first argument, or stdin
pub fn read_input(arg: Option<String>) -> std::io::Result<String> {
    match arg {
        Some(path) if path != "-" => std::fs::read_to_string(path),
        _ => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            Ok(input)
        }
    }
}

/// EMF sink for the configured metrics output
pub fn open_metrics_sink(
    output: &MetricsOutput,
) -> std::io::Result<EmfSink<Box<dyn Write + Send>>> {
    let out: Box<dyn Write + Send> = match output {
        MetricsOutput::Stdout => Box::new(std::io::stdout()),
        MetricsOutput::File(path) => Box::new(std::io::BufWriter::new(
            std::fs::OpenOptions::new().create(true).append(true).open(path)?,
        )),
    };
    Ok(EmfSink::new(out))
}

/// `env_logger` to stderr, `info` unless `RUST_LOG` says otherwise
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();
}
