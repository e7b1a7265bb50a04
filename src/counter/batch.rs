//! Per-invocation counter for the batch pipeline

use super::{CountRow, CounterKey};
use crate::record::LogRecord;
use std::collections::{BTreeMap, HashMap};

/// Counts one batch of records by (distribution, minute, edge, status)
///
/// Iteration order of the underlying map is never relied on; scopes are
/// returned sorted.
#[derive(Debug, Default)]
pub struct BatchCounter {
    counts: HashMap<CounterKey, u64>,
}

impl BatchCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: &LogRecord) -> u64 {
        let count = self.counts.entry(CounterKey::per_minute(record)).or_insert(0);
        *count += 1;
        *count
    }

    pub fn get(&self, key: &CounterKey) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Rows grouped by (distribution, minute), both sorted ascending
    pub fn scopes(&self) -> BTreeMap<(String, i64), Vec<CountRow>> {
        let mut scopes: BTreeMap<(String, i64), Vec<CountRow>> = BTreeMap::new();

        for (key, count) in &self.counts {
            scopes
                .entry((key.distribution.clone(), key.bucket))
                .or_default()
                .push(CountRow {
                    edge_location: key.edge_location.clone(),
                    status_code: key.status_code.clone(),
                    count: *count,
                });
        }

        for rows in scopes.values_mut() {
            rows.sort_by(|a, b| {
                (&a.edge_location, &a.status_code).cmp(&(&b.edge_location, &b.status_code))
            });
        }

        scopes
    }
}

impl<'a> Extend<&'a LogRecord> for BatchCounter {
    fn extend<I: IntoIterator<Item = &'a LogRecord>>(&mut self, records: I) {
        for record in records {
            self.add(record);
        }
    }
}
