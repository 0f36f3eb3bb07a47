//! Health data imported from a JSON export file
//!
//! Export format:
//!
//! ```json
//! {
//!   "samples": { "heart_rate": [{ "start": "...", "end": "...", "value": 61, "unit": "bpm" }] },
//!   "workouts": [{ "start": "...", "end": "...", "activity": "running", "energy_kcal": 310 }]
//! }
//! ```

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use super::{InMemoryHealthSource, RawSample, RawWorkout};
use crate::models::{MetricType, ReadingSource};

#[derive(Debug, Default, Deserialize)]
struct HealthExport {
    #[serde(default)]
    samples: HashMap<String, Vec<RawSample>>,
    #[serde(default)]
    workouts: Vec<RawWorkout>,
}

/// Loads an export file into an [`InMemoryHealthSource`]
///
/// Everything loaded this way is tagged as imported data.
pub struct FileHealthSource;

impl FileHealthSource {
    /// Load an export from disk
    pub fn load(path: &Path) -> Result<InMemoryHealthSource> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read health export: {}", path.display()))?;
        let source = Self::from_json(&content)
            .with_context(|| format!("Failed to parse health export: {}", path.display()))?;
        info!(
            "Loaded {} samples and {} workouts from {}",
            source.sample_count(),
            source.workout_count(),
            path.display()
        );
        Ok(source)
    }

    /// Parse an export from a JSON string
    pub fn from_json(json: &str) -> Result<InMemoryHealthSource> {
        let export: HealthExport = serde_json::from_str(json)?;
        let source = InMemoryHealthSource::new();

        for (name, samples) in export.samples {
            let Some(metric) = MetricType::from_wire_name(&name) else {
                warn!("Skipping {} samples of unknown metric '{}'", samples.len(), name);
                continue;
            };
            source.add_samples(
                metric,
                samples.into_iter().map(|mut s| {
                    s.source = ReadingSource::Import;
                    s
                }),
            );
        }

        source.add_workouts(export.workouts.into_iter().map(|mut w| {
            w.source = ReadingSource::Import;
            w
        }));

        Ok(source)
    }
}
