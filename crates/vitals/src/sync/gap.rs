//! Gap analysis: what to extract, given what the backend already holds
//!
//! Pure decisions over a [`BackendTimestamps`] snapshot. Nothing here talks
//! to the store or the network.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{BackendTimestamps, ExtractionTarget, MetricType};

/// Lookback for a full historical sync (three years)
pub const DEFAULT_HISTORICAL_LOOKBACK_DAYS: i64 = 3 * 365;

/// Lookback used when backend timestamps cannot be fetched
pub const DEFAULT_FALLBACK_LOOKBACK_DAYS: i64 = 7;

/// Minimum number of populated core metrics for an incremental sync
const MIN_POPULATED_CORE_METRICS: usize = 2;

/// How much history a run extracts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    /// Every target over the full lookback
    Historical,
    /// Each target from its latest backend timestamp
    Incremental,
}

impl fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStrategy::Historical => "historical",
            SyncStrategy::Incremental => "incremental",
        };
        f.write_str(name)
    }
}

/// Inclusive time range to extract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SyncWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Window ending at `now` and reaching back `lookback`
    pub fn lookback(now: DateTime<Utc>, lookback: Duration) -> Self {
        Self::new(now - lookback, now)
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

/// Historical when fewer than two core metrics have backend data,
/// incremental otherwise
pub fn decide_strategy(timestamps: &BackendTimestamps) -> SyncStrategy {
    if timestamps.populated_core_count() < MIN_POPULATED_CORE_METRICS {
        SyncStrategy::Historical
    } else {
        SyncStrategy::Incremental
    }
}

/// Computes per-target extraction windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapAnalyzer {
    pub historical_lookback: Duration,
    pub fallback_lookback: Duration,
}

impl Default for GapAnalyzer {
    fn default() -> Self {
        Self {
            historical_lookback: Duration::days(DEFAULT_HISTORICAL_LOOKBACK_DAYS),
            fallback_lookback: Duration::days(DEFAULT_FALLBACK_LOOKBACK_DAYS),
        }
    }
}

impl GapAnalyzer {
    pub fn new(historical_lookback: Duration, fallback_lookback: Duration) -> Self {
        Self {
            historical_lookback,
            fallback_lookback,
        }
    }

    /// Incremental window for one metric
    ///
    /// Starts at the backend's latest timestamp for the metric. Workout
    /// sub-signals are extracted together, so they start at the earliest
    /// populated timestamp across the group. Metrics without backend data
    /// get the full historical lookback.
    pub fn window_for(
        &self,
        metric: MetricType,
        timestamps: &BackendTimestamps,
        now: DateTime<Utc>,
    ) -> SyncWindow {
        let latest = match metric.composite_group() {
            Some(group) => group.iter().filter_map(|m| timestamps.get(*m)).min(),
            None => timestamps.get(metric),
        };

        match latest {
            Some(start) => SyncWindow::new(start.min(now), now),
            None => SyncWindow::lookback(now, self.historical_lookback),
        }
    }

    /// Window for every extraction target under `strategy`
    pub fn plan_windows(
        &self,
        strategy: SyncStrategy,
        timestamps: &BackendTimestamps,
        now: DateTime<Utc>,
    ) -> Vec<(ExtractionTarget, SyncWindow)> {
        match strategy {
            SyncStrategy::Historical => {
                self.uniform(SyncWindow::lookback(now, self.historical_lookback))
            }
            SyncStrategy::Incremental => ExtractionTarget::all()
                .into_iter()
                .map(|target| {
                    let metric = target.metrics()[0];
                    (target, self.window_for(metric, timestamps, now))
                })
                .collect(),
        }
    }

    /// Short window for every target, used when backend timestamps are
    /// unavailable
    pub fn fallback_windows(&self, now: DateTime<Utc>) -> Vec<(ExtractionTarget, SyncWindow)> {
        self.uniform(SyncWindow::lookback(now, self.fallback_lookback))
    }

    /// The same window for every target
    pub fn uniform(&self, window: SyncWindow) -> Vec<(ExtractionTarget, SyncWindow)> {
        ExtractionTarget::all()
            .into_iter()
            .map(|target| (target, window))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timestamps(entries: &[(MetricType, DateTime<Utc>)]) -> BackendTimestamps {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_strategy_needs_two_core_metrics() {
        let now = Utc::now();
        assert_eq!(
            decide_strategy(&BackendTimestamps::new()),
            SyncStrategy::Historical
        );

        // Non-core metrics do not count
        let non_core = timestamps(&[
            (MetricType::HeartRate, now),
            (MetricType::BodyMass, now),
            (MetricType::BloodGlucose, now),
        ]);
        assert_eq!(decide_strategy(&non_core), SyncStrategy::Historical);

        let two_core = timestamps(&[(MetricType::HeartRate, now), (MetricType::StepCount, now)]);
        assert_eq!(decide_strategy(&two_core), SyncStrategy::Incremental);
    }

    #[test]
    fn test_strategy_is_deterministic() {
        let now = Utc::now();
        let ts = timestamps(&[(MetricType::StandTime, now), (MetricType::ActiveEnergy, now)]);
        let first = decide_strategy(&ts);
        for _ in 0..10 {
            assert_eq!(decide_strategy(&ts), first);
        }
    }

    #[test]
    fn test_window_for_simple_metric() {
        let analyzer = GapAnalyzer::default();
        let now = Utc::now();
        let latest = now - Duration::hours(6);
        let ts = timestamps(&[(MetricType::HeartRate, latest)]);

        let window = analyzer.window_for(MetricType::HeartRate, &ts, now);
        assert_eq!(window, SyncWindow::new(latest, now));

        let missing = analyzer.window_for(MetricType::StepCount, &ts, now);
        assert_eq!(missing.start, now - Duration::days(3 * 365));
        assert_eq!(missing.end, now);
    }

    #[test]
    fn test_window_for_composite_uses_earliest_subsignal() {
        let analyzer = GapAnalyzer::default();
        let now = Utc::now();
        let ts = timestamps(&[
            (MetricType::WorkoutDuration, now - Duration::days(1)),
            (MetricType::WorkoutDistance, now - Duration::days(4)),
        ]);

        for metric in [
            MetricType::WorkoutDuration,
            MetricType::WorkoutCalories,
            MetricType::WorkoutDistance,
        ] {
            let window = analyzer.window_for(metric, &ts, now);
            assert_eq!(window.start, now - Duration::days(4));
        }

        let none = analyzer.window_for(MetricType::WorkoutCalories, &BackendTimestamps::new(), now);
        assert_eq!(none.start, now - Duration::days(3 * 365));
    }

    #[test]
    fn test_future_timestamp_is_clamped() {
        let now = Utc::now();
        let ts = timestamps(&[(MetricType::BodyMass, now + Duration::hours(1))]);
        let window = GapAnalyzer::default().window_for(MetricType::BodyMass, &ts, now);
        assert_eq!(window.start, now);
        assert!(!window.is_empty());
    }

    #[test]
    fn test_plan_windows_historical() {
        let analyzer = GapAnalyzer::default();
        let now = Utc::now();
        let ts = timestamps(&[(MetricType::HeartRate, now - Duration::hours(1))]);

        let plan = analyzer.plan_windows(SyncStrategy::Historical, &ts, now);
        assert_eq!(plan.len(), ExtractionTarget::all().len());
        assert!(
            plan.iter()
                .all(|(_, w)| *w == SyncWindow::lookback(now, Duration::days(3 * 365)))
        );
    }

    #[test]
    fn test_plan_windows_incremental() {
        let analyzer = GapAnalyzer::default();
        let now = Utc::now();
        let hr = now - Duration::hours(2);
        let steps = now - Duration::hours(5);
        let ts = timestamps(&[(MetricType::HeartRate, hr), (MetricType::StepCount, steps)]);

        let plan = analyzer.plan_windows(SyncStrategy::Incremental, &ts, now);
        let window = |target: ExtractionTarget| {
            plan.iter()
                .find(|(t, _)| *t == target)
                .map(|(_, w)| *w)
                .unwrap()
        };

        assert_eq!(window(ExtractionTarget::Metric(MetricType::HeartRate)).start, hr);
        assert_eq!(window(ExtractionTarget::Metric(MetricType::StepCount)).start, steps);
        assert_eq!(
            window(ExtractionTarget::Workouts).start,
            now - Duration::days(3 * 365)
        );
    }

    #[test]
    fn test_fallback_windows() {
        let analyzer = GapAnalyzer::default();
        let now = Utc::now();
        let plan = analyzer.fallback_windows(now);
        assert_eq!(plan.len(), 12);
        assert!(plan.iter().all(|(_, w)| w.start == now - Duration::days(7)));
    }
}
