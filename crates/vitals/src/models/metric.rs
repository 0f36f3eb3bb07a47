//! Metric catalog: every health metric the engine knows how to sync
//!
//! Each entry carries its backend wire name, the page size used when
//! querying the local health store, and the unit rule that converts raw
//! store values into the canonical unit the backend expects.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A trackable health metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    HeartRate,
    BloodPressureSystolic,
    BloodPressureDiastolic,
    BloodGlucose,
    BodyTemperature,
    BodyMass,
    StepCount,
    StandTime,
    ActiveEnergy,
    FlightsClimbed,
    WorkoutDuration,
    WorkoutCalories,
    WorkoutDistance,
    SleepDuration,
}

/// Metrics that decide between historical and incremental sync
pub const CORE_METRICS: [MetricType; 4] = [
    MetricType::HeartRate,
    MetricType::StepCount,
    MetricType::ActiveEnergy,
    MetricType::StandTime,
];

/// Sub-signals extracted from a single workout event
pub const WORKOUT_METRICS: [MetricType; 3] = [
    MetricType::WorkoutDuration,
    MetricType::WorkoutCalories,
    MetricType::WorkoutDistance,
];

impl MetricType {
    pub const ALL: [MetricType; 14] = [
        MetricType::HeartRate,
        MetricType::BloodPressureSystolic,
        MetricType::BloodPressureDiastolic,
        MetricType::BloodGlucose,
        MetricType::BodyTemperature,
        MetricType::BodyMass,
        MetricType::StepCount,
        MetricType::StandTime,
        MetricType::ActiveEnergy,
        MetricType::FlightsClimbed,
        MetricType::WorkoutDuration,
        MetricType::WorkoutCalories,
        MetricType::WorkoutDistance,
        MetricType::SleepDuration,
    ];

    /// Name used by the backend for this metric
    pub fn wire_name(self) -> &'static str {
        match self {
            MetricType::HeartRate => "heart_rate",
            MetricType::BloodPressureSystolic => "blood_pressure_systolic",
            MetricType::BloodPressureDiastolic => "blood_pressure_diastolic",
            MetricType::BloodGlucose => "blood_glucose",
            MetricType::BodyTemperature => "body_temperature",
            MetricType::BodyMass => "body_mass",
            MetricType::StepCount => "step_count",
            MetricType::StandTime => "stand_time",
            MetricType::ActiveEnergy => "active_energy",
            MetricType::FlightsClimbed => "flights_climbed",
            MetricType::WorkoutDuration => "workout_duration",
            MetricType::WorkoutCalories => "workout_calories",
            MetricType::WorkoutDistance => "workout_distance",
            MetricType::SleepDuration => "sleep_duration",
        }
    }

    /// Parse a backend wire name
    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.wire_name() == name)
    }

    /// Human-readable label for progress messages
    pub fn display_name(self) -> &'static str {
        match self {
            MetricType::HeartRate => "Heart Rate",
            MetricType::BloodPressureSystolic => "Blood Pressure (Systolic)",
            MetricType::BloodPressureDiastolic => "Blood Pressure (Diastolic)",
            MetricType::BloodGlucose => "Blood Glucose",
            MetricType::BodyTemperature => "Body Temperature",
            MetricType::BodyMass => "Body Mass",
            MetricType::StepCount => "Steps",
            MetricType::StandTime => "Stand Time",
            MetricType::ActiveEnergy => "Active Energy",
            MetricType::FlightsClimbed => "Flights Climbed",
            MetricType::WorkoutDuration => "Workout Duration",
            MetricType::WorkoutCalories => "Workout Calories",
            MetricType::WorkoutDistance => "Workout Distance",
            MetricType::SleepDuration => "Sleep",
        }
    }

    /// Maximum number of samples returned by one local store query.
    ///
    /// High-frequency metrics (steps, energy) get the largest pages.
    pub fn page_limit(self) -> usize {
        match self {
            MetricType::StepCount | MetricType::ActiveEnergy => 25_000,
            MetricType::HeartRate => 10_000,
            MetricType::BloodGlucose
            | MetricType::StandTime
            | MetricType::FlightsClimbed
            | MetricType::SleepDuration => 5_000,
            MetricType::BloodPressureSystolic
            | MetricType::BloodPressureDiastolic
            | MetricType::BodyTemperature
            | MetricType::BodyMass
            | MetricType::WorkoutDuration
            | MetricType::WorkoutCalories
            | MetricType::WorkoutDistance => 1_000,
        }
    }

    /// Unit the backend stores this metric in
    pub fn canonical_unit(self) -> &'static str {
        self.unit_rule().canonical
    }

    pub fn unit_rule(self) -> UnitRule {
        match self {
            MetricType::HeartRate => UnitRule::new("count/min", &[("bpm", 1.0, 0.0)]),
            MetricType::BloodPressureSystolic | MetricType::BloodPressureDiastolic => {
                UnitRule::new("mmHg", &[])
            }
            MetricType::BloodGlucose => UnitRule::new("mg/dL", &[("mmol/L", 18.0182, 0.0)]),
            MetricType::BodyTemperature => {
                UnitRule::new("degC", &[("degF", 0.555_555_555_555_555_6, -17.777_777_777_777_78)])
            }
            MetricType::BodyMass => {
                UnitRule::new("kg", &[("lb", 0.453_592_37, 0.0), ("g", 0.001, 0.0)])
            }
            MetricType::StepCount | MetricType::FlightsClimbed => UnitRule::new("count", &[]),
            MetricType::StandTime | MetricType::WorkoutDuration => {
                UnitRule::new("min", &[("s", 0.016_666_666_666_666_666, 0.0), ("hr", 60.0, 0.0)])
            }
            MetricType::ActiveEnergy | MetricType::WorkoutCalories => {
                UnitRule::new("kcal", &[("Cal", 1.0, 0.0), ("kJ", 0.239_006, 0.0)])
            }
            MetricType::WorkoutDistance => {
                UnitRule::new("km", &[("m", 0.001, 0.0), ("mi", 1.609_344, 0.0)])
            }
            MetricType::SleepDuration => UnitRule::new(
                "hr",
                &[("min", 0.016_666_666_666_666_666, 0.0), ("s", 0.000_277_777_777_777_777_8, 0.0)],
            ),
        }
    }

    /// Whether this metric participates in the historical/incremental decision
    pub fn is_core(self) -> bool {
        CORE_METRICS.contains(&self)
    }

    /// Sibling sub-signals when this metric is extracted as part of a
    /// composite event (workouts)
    pub fn composite_group(self) -> Option<&'static [MetricType]> {
        if WORKOUT_METRICS.contains(&self) {
            Some(&WORKOUT_METRICS)
        } else {
            None
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Linear conversion from known source units into a canonical unit
///
/// `canonical = value * scale + offset`
#[derive(Debug, Clone, Copy)]
pub struct UnitRule {
    pub canonical: &'static str,
    conversions: &'static [(&'static str, f64, f64)],
}

impl UnitRule {
    const fn new(canonical: &'static str, conversions: &'static [(&'static str, f64, f64)]) -> Self {
        Self {
            canonical,
            conversions,
        }
    }

    /// Convert a raw value into the canonical unit.
    ///
    /// An empty unit is taken to already be canonical. Returns `None` for
    /// units the rule does not know.
    pub fn convert(&self, value: f64, unit: &str) -> Option<f64> {
        if unit.is_empty() || unit == self.canonical {
            return Some(value);
        }
        self.conversions
            .iter()
            .find(|(from, _, _)| *from == unit)
            .map(|(_, scale, offset)| value * scale + offset)
    }
}

/// One unit of extraction work: either a plain metric or the composite
/// workout event that yields several metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionTarget {
    Metric(MetricType),
    Workouts,
}

impl ExtractionTarget {
    /// Every extraction task a full sync fans out to
    pub fn all() -> Vec<ExtractionTarget> {
        let mut targets: Vec<ExtractionTarget> = MetricType::ALL
            .into_iter()
            .filter(|m| m.composite_group().is_none())
            .map(ExtractionTarget::Metric)
            .collect();
        targets.push(ExtractionTarget::Workouts);
        targets
    }

    /// Metrics produced by this target
    pub fn metrics(&self) -> &[MetricType] {
        match self {
            ExtractionTarget::Metric(metric) => std::slice::from_ref(metric),
            ExtractionTarget::Workouts => &WORKOUT_METRICS,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExtractionTarget::Metric(metric) => metric.display_name(),
            ExtractionTarget::Workouts => "Workouts",
        }
    }

    /// Page size for store queries issued by this target
    pub fn page_limit(self) -> usize {
        match self {
            ExtractionTarget::Metric(metric) => metric.page_limit(),
            ExtractionTarget::Workouts => MetricType::WorkoutDuration.page_limit(),
        }
    }
}
