//! In-memory health source
//!
//! Backs the file importer and the tests. Behaves like a paginating store:
//! every query is capped at `limit` and sorted by start time.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{HealthSource, RawSample, RawWorkout};
use crate::models::MetricType;

pub struct InMemoryHealthSource {
    samples: RwLock<HashMap<MetricType, Vec<RawSample>>>,
    workouts: RwLock<Vec<RawWorkout>>,
    /// Metrics whose queries fail, for exercising error isolation
    failing: RwLock<HashSet<MetricType>>,
    fail_workouts: RwLock<bool>,
    queries: AtomicUsize,
}

impl InMemoryHealthSource {
    pub fn new() -> Self {
        Self {
            samples: RwLock::new(HashMap::new()),
            workouts: RwLock::new(Vec::new()),
            failing: RwLock::new(HashSet::new()),
            fail_workouts: RwLock::new(false),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn add_samples(&self, metric: MetricType, samples: impl IntoIterator<Item = RawSample>) {
        let mut all = self.samples.write().unwrap();
        let entry = all.entry(metric).or_default();
        entry.extend(samples);
        entry.sort_by_key(|s| s.start);
    }

    pub fn add_workouts(&self, workouts: impl IntoIterator<Item = RawWorkout>) {
        let mut all = self.workouts.write().unwrap();
        all.extend(workouts);
        all.sort_by_key(|w| w.start);
    }

    /// Make every query for `metric` return an error
    pub fn fail_metric(&self, metric: MetricType) {
        self.failing.write().unwrap().insert(metric);
    }

    /// Make every workout query return an error
    pub fn fail_workout_queries(&self) {
        *self.fail_workouts.write().unwrap() = true;
    }

    /// Total number of queries served (including failed ones)
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn sample_count(&self) -> usize {
        self.samples.read().unwrap().values().map(Vec::len).sum()
    }

    pub fn workout_count(&self) -> usize {
        self.workouts.read().unwrap().len()
    }
}

impl Default for InMemoryHealthSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthSource for InMemoryHealthSource {
    fn query_samples(
        &self,
        metric: MetricType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RawSample>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.failing.read().unwrap().contains(&metric) {
            bail!("Health store query failed for {}", metric);
        }

        let samples = self.samples.read().unwrap();
        Ok(samples
            .get(&metric)
            .map(|all| {
                all.iter()
                    .filter(|s| s.start >= start && s.start <= end)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn query_workouts(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RawWorkout>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if *self.fail_workouts.read().unwrap() {
            bail!("Health store workout query failed");
        }

        let workouts = self.workouts.read().unwrap();
        Ok(workouts
            .iter()
            .filter(|w| w.start >= start && w.start <= end)
            .take(limit)
            .cloned()
            .collect())
    }
}
