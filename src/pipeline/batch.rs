//! Batch pipeline: one invocation, no durable store

use super::{emit_scopes, EmitReport};
use crate::counter::BatchCounter;
use crate::emit::{Emitter, MetricsSink};
use crate::error::EdgeflowResult;
use crate::record::{LogRecord, StreamBatch};
use crate::window::batch_scopes;

/// Aggregates a whole stream batch in memory by minute and emits a summary
/// for every (distribution, minute, edge location) it contains
pub struct BatchPipeline {
    emitter: Emitter,
}

impl BatchPipeline {
    pub fn new(emitter: Emitter) -> Self {
        Self { emitter }
    }

    pub async fn handle(
        &self,
        batch: &StreamBatch,
        sink: &mut dyn MetricsSink,
    ) -> EdgeflowResult<EmitReport> {
        let records = batch.parse_records()?;
        self.handle_records(&records, sink).await
    }

    pub async fn handle_records(
        &self,
        records: &[LogRecord],
        sink: &mut dyn MetricsSink,
    ) -> EdgeflowResult<EmitReport> {
        let mut counter = BatchCounter::new();
        counter.extend(records);

        let scopes = batch_scopes(&counter);
        log::info!(
            "📊 Batch of {} records: {} counters across {} (distribution, minute) scopes",
            records.len(),
            counter.len(),
            scopes.len()
        );

        let report = emit_scopes(&self.emitter, &scopes, sink).await?;
        log::info!(
            "✅ Emitted {} points for {} edge locations",
            report.points,
            report.summaries
        );
        Ok(report)
    }
}
