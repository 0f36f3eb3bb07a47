//! Local health store capability

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{MetricType, ReadingSource};

/// One sample as the local health store reports it, in the store's unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Store-assigned identifier, when the store has one
    #[serde(default)]
    pub id: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub value: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default = "default_source")]
    pub source: ReadingSource,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// A workout event; fans out into duration, calories and distance readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawWorkout {
    #[serde(default)]
    pub id: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Activity name, e.g. "running"
    pub activity: String,
    #[serde(default)]
    pub energy_kcal: Option<f64>,
    #[serde(default)]
    pub distance_m: Option<f64>,
    #[serde(default = "default_source")]
    pub source: ReadingSource,
    #[serde(default)]
    pub device: Option<String>,
}

fn default_source() -> ReadingSource {
    ReadingSource::Device
}

/// Read-only access to the on-device health store
///
/// Both queries return at most `limit` items in `[start, end]`, sorted
/// ascending by start time. Authorization is assumed to be granted before
/// the engine runs.
pub trait HealthSource: Send + Sync {
    /// Samples of one metric
    fn query_samples(
        &self,
        metric: MetricType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RawSample>>;

    /// Workout events
    fn query_workouts(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RawWorkout>>;
}
