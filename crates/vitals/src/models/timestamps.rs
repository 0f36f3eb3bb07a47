//! Latest ingested timestamps reported by the backend

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::MetricType;

/// Per-metric timestamp of the most recent reading the backend holds
///
/// A read-only snapshot taken once per sync decision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendTimestamps(HashMap<MetricType, DateTime<Utc>>);

impl BackendTimestamps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, metric: MetricType) -> Option<DateTime<Utc>> {
        self.0.get(&metric).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Number of core metrics the backend has data for
    pub fn populated_core_count(&self) -> usize {
        self.0.keys().filter(|metric| metric.is_core()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricType, DateTime<Utc>)> + '_ {
        self.0.iter().map(|(metric, ts)| (*metric, *ts))
    }
}

impl FromIterator<(MetricType, DateTime<Utc>)> for BackendTimestamps {
    fn from_iter<I: IntoIterator<Item = (MetricType, DateTime<Utc>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
