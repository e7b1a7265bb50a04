//! Per-edge-location status summaries

use crate::counter::CountRow;
use crate::window::AggregationScope;
use std::collections::BTreeMap;

/// HTTP status classes that get their own metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusClass {
    Success,
    ClientError,
    ServerError,
}

impl StatusClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusClass::Success => "2xx",
            StatusClass::ClientError => "4xx",
            StatusClass::ServerError => "5xx",
        }
    }

    pub fn all() -> [StatusClass; 3] {
        [
            StatusClass::Success,
            StatusClass::ClientError,
            StatusClass::ServerError,
        ]
    }

    /// Class of a status code by its leading character only
    ///
    /// `"520"` is 5xx and nothing else; 1xx, 3xx and unknown codes have no class.
    pub fn classify(status_code: &str) -> Option<StatusClass> {
        match status_code.trim().chars().next() {
            Some('2') => Some(StatusClass::Success),
            Some('4') => Some(StatusClass::ClientError),
            Some('5') => Some(StatusClass::ServerError),
            _ => None,
        }
    }
}

impl std::fmt::Display for StatusClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived metrics for one edge location within one scope
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeLocationSummary {
    pub distribution: String,
    pub edge_location: String,
    pub timestamp: i64,
    /// Every request, classified or not
    pub total: u64,
    /// Always holds all three classes, zero when absent
    pub class_counts: BTreeMap<StatusClass, u64>,
    /// Empty when `total == 0`
    pub class_percentages: BTreeMap<StatusClass, f64>,
}

impl EdgeLocationSummary {
    pub fn from_status_counts<'a>(
        distribution: &str,
        edge_location: &str,
        timestamp: i64,
        status_counts: impl IntoIterator<Item = (&'a str, u64)>,
    ) -> Self {
        let mut total = 0u64;
        let mut class_counts: BTreeMap<StatusClass, u64> =
            StatusClass::all().into_iter().map(|class| (class, 0)).collect();

        for (status_code, count) in status_counts {
            total += count;
            if let Some(class) = StatusClass::classify(status_code) {
                *class_counts.entry(class).or_insert(0) += count;
            }
        }

        let class_percentages = if total > 0 {
            class_counts
                .iter()
                .map(|(class, count)| (*class, percentage(*count, total)))
                .collect()
        } else {
            log::warn!(
                "Edge location {} of {} has no requests at {}, skipping percentages",
                edge_location,
                distribution,
                timestamp
            );
            BTreeMap::new()
        };

        Self {
            distribution: distribution.to_string(),
            edge_location: edge_location.to_string(),
            timestamp,
            total,
            class_counts,
            class_percentages,
        }
    }

    pub fn class_count(&self, class: StatusClass) -> u64 {
        self.class_counts.get(&class).copied().unwrap_or(0)
    }

    pub fn class_percentage(&self, class: StatusClass) -> Option<f64> {
        self.class_percentages.get(&class).copied()
    }
}

/// `100 * count / total` rounded to two decimals, ties to even
pub fn percentage(count: u64, total: u64) -> f64 {
    let raw = count as f64 * 100.0 / total as f64;
    (raw * 100.0).round_ties_even() / 100.0
}

/// Summaries for every edge location in the scope, sorted by edge location
pub fn summarize(scope: &AggregationScope) -> Vec<EdgeLocationSummary> {
    let mut by_edge: BTreeMap<&str, Vec<&CountRow>> = BTreeMap::new();
    for row in &scope.rows {
        by_edge.entry(row.edge_location.as_str()).or_default().push(row);
    }

    by_edge
        .into_iter()
        .map(|(edge_location, rows)| {
            EdgeLocationSummary::from_status_counts(
                &scope.distribution,
                edge_location,
                scope.timestamp,
                rows.into_iter().map(|row| (row.status_code.as_str(), row.count)),
            )
        })
        .collect()
}
