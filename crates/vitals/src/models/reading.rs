//! Reading model: one extracted, unit-normalized health measurement

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MetricType;

/// Where a reading originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingSource {
    /// Recorded by a device or the health store itself
    Device,
    /// Brought in from an export file or another app
    Import,
}

/// A single measurement ready for upload
///
/// Field names follow the backend's bulk ingestion format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(rename = "vital_type")]
    pub metric_type: MetricType,
    pub value: f64,
    pub unit: String,
    #[serde(rename = "recorded_at")]
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub source: ReadingSource,
    #[serde(rename = "notes", default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Reading {
    /// Create a new reading builder
    ///
    /// The unit defaults to the metric's canonical unit and the end time
    /// to the start time.
    pub fn builder(
        metric_type: MetricType,
        value: f64,
        start_time: DateTime<Utc>,
    ) -> ReadingBuilder {
        ReadingBuilder::new(metric_type, value, start_time)
    }
}

/// Builder for creating Reading instances
pub struct ReadingBuilder {
    metric_type: MetricType,
    value: f64,
    unit: Option<String>,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    source: ReadingSource,
    note: Option<String>,
    source_device: Option<String>,
    confidence: Option<f64>,
}

impl ReadingBuilder {
    fn new(metric_type: MetricType, value: f64, start_time: DateTime<Utc>) -> Self {
        Self {
            metric_type,
            value,
            unit: None,
            start_time,
            end_time: None,
            source: ReadingSource::Device,
            note: None,
            source_device: None,
            confidence: None,
        }
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn source(mut self, source: ReadingSource) -> Self {
        self.source = source;
        self
    }

    pub fn note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }

    pub fn source_device(mut self, source_device: Option<String>) -> Self {
        self.source_device = source_device;
        self
    }

    pub fn confidence(mut self, confidence: Option<f64>) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn build(self) -> Reading {
        Reading {
            metric_type: self.metric_type,
            value: self.value,
            unit: self
                .unit
                .unwrap_or_else(|| self.metric_type.canonical_unit().to_string()),
            start_time: self.start_time,
            end_time: self.end_time.unwrap_or(self.start_time),
            source: self.source,
            note: self.note,
            source_device: self.source_device,
            confidence: self.confidence,
        }
    }
}
