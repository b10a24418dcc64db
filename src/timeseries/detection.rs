use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timeseries::functions::{
    serialize_round_2, serialize_round_2_opt, serialize_round_3, SignalStatistics,
};
use crate::timeseries::segmentation::AdmissionEpisode;

/// Physiologic bounds of a vital sign. Both ends are normal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VitalSignRange {
    pub min: f64,
    pub max: f64,
}

impl VitalSignRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstabilityThresholds {
    /// Consecutive-reading delta that counts as a sudden change. Also bounds the rolling std.
    pub sudden_change_magnitude: f64,
    pub max_coefficient_of_variation: f64,
    pub max_sudden_fluctuation_count: usize,
}

/// Declarative configuration of one tracked signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalSignSpec {
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub range: Option<VitalSignRange>,
    #[serde(default)]
    pub instability: Option<InstabilityThresholds>,
}

/// Tracked vital signs, evaluated in listed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalSignCatalog {
    pub signs: Vec<VitalSignSpec>,
}

impl Default for VitalSignCatalog {
    fn default() -> Self {
        let sign = |name: &str, unit: &str, min: f64, max: f64, sudden: f64, cv: f64, fluctuations: usize| {
            VitalSignSpec {
                name: name.to_string(),
                unit: Some(unit.to_string()),
                range: Some(VitalSignRange { min, max }),
                instability: Some(InstabilityThresholds {
                    sudden_change_magnitude: sudden,
                    max_coefficient_of_variation: cv,
                    max_sudden_fluctuation_count: fluctuations,
                }),
            }
        };

        VitalSignCatalog {
            signs: vec![
                sign("Diastolic Blood Pressure", "mm[Hg]", 60.0, 80.0, 10.0, 0.15, 2),
                sign("Systolic Blood Pressure", "mm[Hg]", 90.0, 120.0, 18.0, 0.15, 2),
                sign("Heart rate", "/min", 60.0, 100.0, 12.0, 0.2, 4),
                sign("Respiratory rate", "/min", 12.0, 20.0, 5.0, 0.25, 3),
            ],
        }
    }
}

impl VitalSignCatalog {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.signs.iter().map(|s| s.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&VitalSignSpec> {
        self.signs.iter().find(|s| s.name == name)
    }
}

/// A reading outside its physiologic range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutOfRangeRecord {
    pub vital_sign: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstabilityReasons {
    pub cv_exceeds_threshold: bool,
    pub sudden_fluctuations_exceed: bool,
    pub high_local_variability: bool,
}

impl InstabilityReasons {
    pub fn any(&self) -> bool {
        self.cv_exceeds_threshold || self.sudden_fluctuations_exceed || self.high_local_variability
    }
}

/// An unstable vital sign within one admission.
///
/// Statistics are held unrounded and rounded when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstabilityRecord {
    pub vital_sign: String,
    #[serde(serialize_with = "serialize_round_2")]
    pub mean: f64,
    #[serde(serialize_with = "serialize_round_2")]
    pub std_dev: f64,
    #[serde(serialize_with = "serialize_round_3")]
    pub coefficient_of_variation: f64,
    pub sudden_change_count: usize,
    #[serde(serialize_with = "serialize_round_2_opt")]
    pub max_rolling_std: Option<f64>,
    pub unstable: bool,
    pub reasons: InstabilityReasons,
}

/// Flags readings outside each signal's normal range.
#[derive(Debug, Clone)]
pub struct RangeDetector {
    ranges: Vec<(String, VitalSignRange)>,
}

impl RangeDetector {
    pub fn from_catalog(catalog: &VitalSignCatalog) -> Self {
        RangeDetector {
            ranges: catalog
                .signs
                .iter()
                .filter_map(|s| s.range.map(|r| (s.name.clone(), r)))
                .collect(),
        }
    }

    /// Out-of-range readings of one episode, grouped by signal in catalog order.
    pub fn detect(&self, episode: &AdmissionEpisode<'_>) -> Vec<OutOfRangeRecord> {
        let mut records = Vec::new();
        for (sign, range) in &self.ranges {
            records.extend(
                episode
                    .numeric_series(sign)
                    .into_iter()
                    .filter(|(_, value)| !range.contains(*value))
                    .map(|(timestamp, value)| OutOfRangeRecord {
                        vital_sign: sign.clone(),
                        timestamp,
                        value,
                    }),
            );
        }
        records
    }
}

/// Classifies signals with excessive dispersion or abrupt changes.
#[derive(Debug, Clone)]
pub struct InstabilityDetector {
    thresholds: Vec<(String, InstabilityThresholds)>,
}

impl InstabilityDetector {
    pub fn from_catalog(catalog: &VitalSignCatalog) -> Self {
        InstabilityDetector {
            thresholds: catalog
                .signs
                .iter()
                .filter_map(|s| s.instability.map(|t| (s.name.clone(), t)))
                .collect(),
        }
    }

    /// Evaluate one signal's readings. `None` when stable or with fewer than two readings.
    pub fn evaluate(sign: &str, values: &[f64], thresholds: &InstabilityThresholds) -> Option<InstabilityRecord> {
        let stats = SignalStatistics::compute(values, thresholds.sudden_change_magnitude)?;

        let reasons = InstabilityReasons {
            cv_exceeds_threshold: stats.coefficient_of_variation > thresholds.max_coefficient_of_variation,
            sudden_fluctuations_exceed: stats.sudden_change_count > thresholds.max_sudden_fluctuation_count,
            high_local_variability: stats
                .max_rolling_std
                .map_or(false, |std| std > thresholds.sudden_change_magnitude),
        };
        if !reasons.any() {
            return None;
        }

        Some(InstabilityRecord {
            vital_sign: sign.to_string(),
            mean: stats.mean,
            std_dev: stats.std_dev,
            coefficient_of_variation: stats.coefficient_of_variation,
            sudden_change_count: stats.sudden_change_count,
            max_rolling_std: stats.max_rolling_std,
            unstable: true,
            reasons,
        })
    }

    /// Unstable signals of one episode, in catalog order.
    pub fn detect(&self, episode: &AdmissionEpisode<'_>) -> Vec<InstabilityRecord> {
        self.thresholds
            .iter()
            .filter_map(|(sign, thresholds)| {
                let values: Vec<f64> = episode.numeric_series(sign).into_iter().map(|(_, v)| v).collect();
                Self::evaluate(sign, &values, thresholds)
            })
            .collect()
    }
}
