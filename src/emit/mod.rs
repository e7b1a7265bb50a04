//! Metric emission
//!
//! Every [`EdgeLocationSummary`] becomes a handful of independent metric
//! points pushed one at a time to a [`MetricsSink`]:
//!
//! ```text
//! <prefix> - Count    RequestCount, 2xx, 4xx, 5xx   (Count)
//! <prefix> - Percent  2xx, 4xx, 5xx                 (Percent, only if total > 0)
//! ```
//!
//! all dimensioned by `cs-host` (distribution) and `x-edge-location`.

pub mod emf;
pub mod memory;

pub use emf::EmfSink;
pub use memory::RecordingSink;

use crate::aggregate::EdgeLocationSummary;
use crate::error::SinkError;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

pub const DEFAULT_NAMESPACE_PREFIX: &str = "CloudFront by Edge Location";

pub const REQUEST_COUNT_METRIC: &str = "RequestCount";
pub const DISTRIBUTION_DIMENSION: &str = "cs-host";
pub const EDGE_LOCATION_DIMENSION: &str = "x-edge-location";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricGroup {
    Count,
    Percent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricUnit {
    Count,
    Percent,
}

impl MetricUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricUnit::Count => "Count",
            MetricUnit::Percent => "Percent",
        }
    }
}

/// Storage resolution in seconds; every point is written at one-second
/// resolution so dashboards can render sub-minute detail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageResolution {
    Second = 1,
}

impl StorageResolution {
    pub fn seconds(&self) -> u32 {
        *self as u32
    }
}

/// One value written to the metrics backend
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub namespace: String,
    pub group: MetricGroup,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    /// (name, value) pairs in emission order
    pub dimensions: Vec<(String, String)>,
    pub value: f64,
    pub unit: MetricUnit,
    pub resolution: StorageResolution,
}

/// Backend trait for metric ingestion
#[async_trait]
pub trait MetricsSink: Send {
    /// Write one metric point
    async fn put_metric(&mut self, point: &MetricPoint) -> Result<(), SinkError>;

    /// Flush pending writes to the backend
    async fn flush(&mut self) -> Result<(), SinkError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}

/// Turns summaries into metric points
#[derive(Debug, Clone)]
pub struct Emitter {
    count_namespace: String,
    percent_namespace: String,
    resolution: StorageResolution,
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE_PREFIX)
    }
}

impl Emitter {
    pub fn new(namespace_prefix: &str) -> Self {
        Self {
            count_namespace: format!("{} - Count", namespace_prefix),
            percent_namespace: format!("{} - Percent", namespace_prefix),
            resolution: StorageResolution::Second,
        }
    }

    pub fn namespace(&self, group: MetricGroup) -> &str {
        match group {
            MetricGroup::Count => &self.count_namespace,
            MetricGroup::Percent => &self.percent_namespace,
        }
    }

    /// Every point for one summary, all sharing its timestamp
    ///
    /// A summary whose timestamp is not a representable instant yields no
    /// points at all.
    pub fn points(&self, summary: &EdgeLocationSummary) -> Result<Vec<MetricPoint>, SinkError> {
        let timestamp = Utc
            .timestamp_opt(summary.timestamp, 0)
            .single()
            .ok_or_else(|| SinkError {
                namespace: self.count_namespace.clone(),
                metric: REQUEST_COUNT_METRIC.to_string(),
                source: format!("timestamp {} is outside the representable range", summary.timestamp)
                    .into(),
            })?;
        let dimensions = vec![
            (DISTRIBUTION_DIMENSION.to_string(), summary.distribution.clone()),
            (EDGE_LOCATION_DIMENSION.to_string(), summary.edge_location.clone()),
        ];
        let point = |group: MetricGroup, name: &str, value: f64, unit: MetricUnit| MetricPoint {
            namespace: self.namespace(group).to_string(),
            group,
            name: name.to_string(),
            timestamp,
            dimensions: dimensions.clone(),
            value,
            unit,
            resolution: self.resolution,
        };

        let mut points = vec![point(
            MetricGroup::Count,
            REQUEST_COUNT_METRIC,
            summary.total as f64,
            MetricUnit::Count,
        )];

        for (class, count) in &summary.class_counts {
            points.push(point(MetricGroup::Count, class.as_str(), *count as f64, MetricUnit::Count));
            if let Some(pct) = summary.class_percentages.get(class) {
                points.push(point(MetricGroup::Percent, class.as_str(), *pct, MetricUnit::Percent));
            }
        }

        Ok(points)
    }

    /// Write every point of one summary, one sink call per point
    ///
    /// Stops at the first refused point; points already written stay written.
    pub async fn emit(
        &self,
        sink: &mut dyn MetricsSink,
        summary: &EdgeLocationSummary,
    ) -> Result<usize, SinkError> {
        let points = self.points(summary).inspect_err(|e| {
            log::error!(
                "❌ No points for {} @ {} at {}: {}",
                summary.distribution,
                summary.edge_location,
                summary.timestamp,
                e
            );
        })?;
        for (written, point) in points.iter().enumerate() {
            if let Err(e) = sink.put_metric(point).await {
                log::error!(
                    "❌ {} rejected {}/{} for {} @ {} at {} after {} points: {}",
                    sink.backend_type(),
                    point.namespace,
                    point.name,
                    summary.distribution,
                    summary.edge_location,
                    summary.timestamp,
                    written,
                    e
                );
                return Err(e);
            }
        }

        log::debug!(
            "📤 {} points for {} @ {} (total {})",
            points.len(),
            summary.distribution,
            summary.edge_location,
            summary.total
        );
        Ok(points.len())
    }
}
