//! In-memory sink for tests and dry runs

use super::{MetricGroup, MetricPoint, MetricsSink, EDGE_LOCATION_DIMENSION};
use crate::error::SinkError;
use async_trait::async_trait;

#[derive(Debug, Default)]
pub struct RecordingSink {
    points: Vec<MetricPoint>,
    fail_after: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `accepted` points, then refuse every write
    pub fn failing_after(accepted: usize) -> Self {
        Self {
            points: Vec::new(),
            fail_after: Some(accepted),
        }
    }

    pub fn points(&self) -> &[MetricPoint] {
        &self.points
    }

    /// Value of the point matching all of the given coordinates
    pub fn value(&self, group: MetricGroup, name: &str, edge_location: &str) -> Option<f64> {
        self.points
            .iter()
            .find(|p| {
                p.group == group
                    && p.name == name
                    && p
                        .dimensions
                        .iter()
                        .any(|(n, v)| n == EDGE_LOCATION_DIMENSION && v == edge_location)
            })
            .map(|p| p.value)
    }
}

#[async_trait]
impl MetricsSink for RecordingSink {
    async fn put_metric(&mut self, point: &MetricPoint) -> Result<(), SinkError> {
        if self.fail_after.is_some_and(|limit| self.points.len() >= limit) {
            return Err(SinkError {
                namespace: point.namespace.clone(),
                metric: point.name.clone(),
                source: "sink refused write".into(),
            });
        }
        self.points.push(point.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
