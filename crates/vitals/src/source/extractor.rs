//! Paginated extraction from the local health store
//!
//! The store caps every query at a per-metric page size, so extraction
//! loops over the window: when a page comes back full, the next query
//! starts one second after the last returned sample. Samples sharing the
//! exact boundary second can be duplicated (removed by dedup) or, when a
//! full page ends inside a burst of same-second samples, skipped. The store
//! offers no opaque cursor, so this is accepted.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use std::collections::HashSet;
use std::sync::Arc;

use super::{HealthSource, RawSample, RawWorkout};
use crate::error::SyncError;
use crate::models::{ExtractionTarget, MetricType, Reading};
use crate::sync::{CancellationToken, SyncWindow};

/// Identity used to drop samples returned twice across page boundaries
#[derive(Debug, PartialEq, Eq, Hash)]
enum SampleKey {
    Id(String),
    Fields(i64, i64, u64),
}

impl SampleKey {
    fn of_sample(sample: &RawSample) -> Self {
        match &sample.id {
            Some(id) => SampleKey::Id(id.clone()),
            None => SampleKey::Fields(
                nanos(sample.start),
                nanos(sample.end),
                sample.value.to_bits(),
            ),
        }
    }

    fn of_workout(workout: &RawWorkout) -> Self {
        match &workout.id {
            Some(id) => SampleKey::Id(id.clone()),
            None => SampleKey::Fields(
                nanos(workout.start),
                nanos(workout.end),
                workout.energy_kcal.unwrap_or_default().to_bits(),
            ),
        }
    }
}

fn nanos(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_nanos_opt().unwrap_or(ts.timestamp_micros())
}

/// Drains every reading of a metric within a window from a [`HealthSource`]
#[derive(Clone)]
pub struct SourceExtractor {
    source: Arc<dyn HealthSource>,
}

impl SourceExtractor {
    pub fn new(source: Arc<dyn HealthSource>) -> Self {
        Self { source }
    }

    /// Every reading of `metric` in `[start, end]`, deduplicated and sorted
    /// ascending by start time
    pub fn fetch(
        &self,
        metric: MetricType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>> {
        self.fetch_cancellable(metric, start, end, &CancellationToken::new())
    }

    /// Like [`fetch`](Self::fetch), checking `cancel` before every page
    pub fn fetch_cancellable(
        &self,
        metric: MetricType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Reading>> {
        let samples = paginate(
            metric.wire_name(),
            start,
            end,
            metric.page_limit(),
            cancel,
            |from, to, limit| self.source.query_samples(metric, from, to, limit),
            |sample: &RawSample| sample.start,
        )?;

        let mut seen = HashSet::new();
        let mut unconvertible = 0usize;
        let rule = metric.unit_rule();
        let mut readings = Vec::with_capacity(samples.len());

        for sample in samples {
            if !seen.insert(SampleKey::of_sample(&sample)) {
                continue;
            }
            let Some(value) = rule.convert(sample.value, &sample.unit).filter(|v| v.is_finite())
            else {
                unconvertible += 1;
                continue;
            };
            readings.push(
                Reading::builder(metric, value, sample.start)
                    .end_time(sample.end)
                    .source(sample.source)
                    .note(sample.note)
                    .source_device(sample.device)
                    .confidence(sample.confidence)
                    .build(),
            );
        }

        if unconvertible > 0 {
            warn!(
                "Dropped {} {} samples with unknown unit or invalid value",
                unconvertible, metric
            );
        }

        readings.sort_by_key(|r| r.start_time);
        Ok(readings)
    }

    /// Workout events in `[start, end]`, each fanned out into duration,
    /// calories and distance readings over the event's window
    pub fn fetch_workouts(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Reading>> {
        let workouts = paginate(
            "workouts",
            start,
            end,
            ExtractionTarget::Workouts.page_limit(),
            cancel,
            |from, to, limit| self.source.query_workouts(from, to, limit),
            |workout: &RawWorkout| workout.start,
        )?;

        let mut seen = HashSet::new();
        let mut readings = Vec::new();
        for workout in workouts {
            if seen.insert(SampleKey::of_workout(&workout)) {
                readings.extend(workout_readings(&workout));
            }
        }

        readings.sort_by_key(|r| r.start_time);
        Ok(readings)
    }

    /// Extract one fan-out target over its window
    pub fn extract(
        &self,
        target: ExtractionTarget,
        window: SyncWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<Reading>> {
        match target {
            ExtractionTarget::Metric(metric) => {
                self.fetch_cancellable(metric, window.start, window.end, cancel)
            }
            ExtractionTarget::Workouts => self.fetch_workouts(window.start, window.end, cancel),
        }
    }
}

/// Cursor loop shared by sample and workout extraction
fn paginate<T>(
    label: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    limit: usize,
    cancel: &CancellationToken,
    mut query: impl FnMut(DateTime<Utc>, DateTime<Utc>, usize) -> Result<Vec<T>>,
    start_of: impl Fn(&T) -> DateTime<Utc>,
) -> Result<Vec<T>> {
    let mut cursor = start;
    let mut items = Vec::new();
    let mut pages = 0usize;

    while cursor <= end {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled.into());
        }

        let page = query(cursor, end, limit)?;
        pages += 1;

        let full = limit > 0 && page.len() >= limit;
        let bounds = page.first().map(&start_of).zip(page.last().map(&start_of));
        items.extend(page);

        // Re-query from the last start time; callers drop the overlap.
        // A page that never moves past its first start steps a second ahead.
        match bounds {
            Some((first, last)) if full && first < last => cursor = last,
            Some((_, last)) if full => cursor = last + Duration::seconds(1),
            _ => break,
        }
    }

    debug!("Extracted {} {} items in {} pages", items.len(), label, pages);
    Ok(items)
}

fn workout_readings(workout: &RawWorkout) -> Vec<Reading> {
    let note = Some(workout.activity.clone());
    let reading = |metric: MetricType, value: f64| {
        Reading::builder(metric, value, workout.start)
            .end_time(workout.end)
            .source(workout.source)
            .note(note.clone())
            .source_device(workout.device.clone())
            .build()
    };

    let minutes = (workout.end - workout.start).num_milliseconds() as f64 / 60_000.0;
    let mut readings = vec![reading(MetricType::WorkoutDuration, minutes.max(0.0))];

    if let Some(kcal) = workout.energy_kcal.filter(|v| v.is_finite()) {
        readings.push(reading(MetricType::WorkoutCalories, kcal));
    }
    if let Some(meters) = workout.distance_m.filter(|v| v.is_finite()) {
        let km = MetricType::WorkoutDistance
            .unit_rule()
            .convert(meters, "m")
            .unwrap_or(meters / 1_000.0);
        readings.push(reading(MetricType::WorkoutDistance, km));
    }

    readings
}
