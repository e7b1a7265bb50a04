//! The two deployable shapes of the aggregation contract
//!
//! ```text
//! split:  StreamBatch → IngestAndCount → CounterStore
//!         WindowRequest → WindowAndEmit → reconstruct_window → summarize → Emitter
//!
//! batch:  StreamBatch → BatchPipeline → BatchCounter → summarize → Emitter
//! ```
//!
//! Handlers keep no state between invocations apart from the counter store.
//! Any error is returned whole so the trigger retries the entire unit.

pub mod batch;
pub mod split;

pub use batch::BatchPipeline;
pub use split::{IngestAndCount, IngestReport, WindowAndEmit};

use crate::aggregate::summarize;
use crate::emit::{Emitter, MetricsSink};
use crate::error::SinkError;
use crate::window::AggregationScope;

/// What one emission run produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitReport {
    pub scopes: usize,
    pub summaries: usize,
    pub points: usize,
}

/// Summarize and emit each scope, then flush the sink
async fn emit_scopes(
    emitter: &Emitter,
    scopes: &[AggregationScope],
    sink: &mut dyn MetricsSink,
) -> Result<EmitReport, SinkError> {
    let mut report = EmitReport::default();

    for scope in scopes {
        report.scopes += 1;
        for summary in summarize(scope) {
            report.points += emitter.emit(sink, &summary).await?;
            report.summaries += 1;
        }
    }

    sink.flush().await?;
    Ok(report)
}
