//! Split pipeline: count now, aggregate later

use super::{emit_scopes, EmitReport};
use crate::counter::{CounterKey, CounterStore};
use crate::emit::{Emitter, MetricsSink};
use crate::error::EdgeflowResult;
use crate::record::StreamBatch;
use crate::window::{reconstruct_window, WindowRequest};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub records: usize,
    /// Distinct counters touched by this batch
    pub counters: usize,
}

/// Consumes stream batches and upserts one durable counter per record
pub struct IngestAndCount {
    store: Arc<dyn CounterStore>,
    ttl_secs: i64,
}

impl IngestAndCount {
    pub fn new(store: Arc<dyn CounterStore>, ttl_secs: i64) -> Self {
        Self { store, ttl_secs }
    }

    /// Count every record of the batch
    ///
    /// The batch is parsed up front, so a malformed record fails it before any
    /// counter moves. A failed upsert fails the batch; counters already bumped
    /// stay bumped and redelivery counts them again.
    pub async fn handle(&self, batch: &StreamBatch) -> EdgeflowResult<IngestReport> {
        let records = batch.parse_records()?;
        let mut touched = HashSet::new();

        for record in &records {
            log::debug!(
                "timestamp: {}   c_ip: {}   sc_status: {}   cs_host: {}   x_edge_location: {}",
                record.timestamp,
                record.client_ip,
                record.status_code,
                record.distribution,
                record.edge_location
            );

            let key = CounterKey::per_second(record);
            self.store.increment(&key, self.ttl_secs).await?;
            touched.insert(key);
        }

        let report = IngestReport {
            records: records.len(),
            counters: touched.len(),
        };
        log::info!(
            "📥 Counted {} records into {} counters ({})",
            report.records,
            report.counters,
            self.store.backend_type()
        );
        Ok(report)
    }
}

/// Rebuilds the trailing window for one distribution and emits its metrics
pub struct WindowAndEmit {
    store: Arc<dyn CounterStore>,
    window_secs: i64,
    emitter: Emitter,
}

impl WindowAndEmit {
    pub fn new(store: Arc<dyn CounterStore>, window_secs: i64, emitter: Emitter) -> Self {
        Self {
            store,
            window_secs,
            emitter,
        }
    }

    pub async fn handle(
        &self,
        request: &WindowRequest,
        sink: &mut dyn MetricsSink,
    ) -> EdgeflowResult<EmitReport> {
        log::info!(
            "⏱️  Window ending {} for distribution {}",
            request.timestamp.format("%Y-%m-%dT%H:%M:%SZ"),
            request.distribution
        );

        let scope = reconstruct_window(
            self.store.clone(),
            &request.distribution,
            request.end_second(),
            self.window_secs,
        )
        .await?;

        let report = emit_scopes(&self.emitter, std::slice::from_ref(&scope), sink).await?;
        log::info!(
            "✅ Emitted {} points for {} edge locations",
            report.points,
            report.summaries
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::MemoryCounterStore;
    use crate::emit::{MetricGroup, RecordingSink};
    use crate::error::EdgeflowError;

    #[tokio::test]
    async fn test_malformed_batch_counts_nothing() {
        let store = Arc::new(MemoryCounterStore::new());
        let ingest = IngestAndCount::new(store.clone(), 900);

        let batch = StreamBatch::from_lines(["10.0\t1.1.1.1\t200\td1\tIAD", "bad line"]);
        let err = ingest.handle(&batch).await.unwrap_err();

        assert!(matches!(err, EdgeflowError::Parse(_)));
        assert!(store.read_bucket(10, "d1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_report() {
        let store = Arc::new(MemoryCounterStore::new());
        let ingest = IngestAndCount::new(store, 900);

        let batch = StreamBatch::from_lines([
            "10.0\t1.1.1.1\t200\td1\tIAD",
            "10.2\t1.1.1.1\t200\td1\tIAD",
            "10.2\t1.1.1.1\t404\td1\tIAD",
        ]);
        let report = ingest.handle(&batch).await.unwrap();

        assert_eq!(report, IngestReport { records: 3, counters: 2 });
    }

    #[tokio::test]
    async fn test_window_and_emit() {
        let store = Arc::new(MemoryCounterStore::new());
        let ingest = IngestAndCount::new(store.clone(), 900);
        ingest
            .handle(&StreamBatch::from_lines([
                "130.0\t1.1.1.1\t200\td1\tSFO",
                "140.0\t1.1.1.1\t503\td1\tSFO",
                "150.0\t1.1.1.1\t200\td2\tSFO",
            ]))
            .await
            .unwrap();

        let window = WindowAndEmit::new(store, 60, Emitter::default());
        let request =
            WindowRequest::from_json(r#"{"timestamp":"1970-01-01T00:02:40Z","distribution":"d1"}"#)
                .unwrap();
        let mut sink = RecordingSink::new();
        let report = window.handle(&request, &mut sink).await.unwrap();

        assert_eq!(report, EmitReport { scopes: 1, summaries: 1, points: 7 });
        assert_eq!(sink.value(MetricGroup::Count, "RequestCount", "SFO"), Some(2.0));
        assert_eq!(sink.value(MetricGroup::Percent, "5xx", "SFO"), Some(50.0));
    }
}
