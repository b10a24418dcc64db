//! VitalWatch: admission segmentation and vital-sign stability analysis
//!
//! VitalWatch takes a patient's raw time-stamped observations, splits them into
//! admission episodes on gaps longer than a day, and evaluates every episode for
//! out-of-range and unstable vital signs.

pub mod api;
pub mod config;
pub mod error;
pub mod fhir;
pub mod storage;
pub mod timeseries;

use serde::{Deserialize, Serialize};

pub use error::{AppError, EngineError};
pub use storage::{Observation, ObservationStore, PatientRecord};
pub use timeseries::query::{AnalysisEngine, AnalysisReport, AdmissionFindings};

/// Raw observation value as it arrives from the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
}

impl Value {
    /// Numeric coercion. Text that does not parse to a finite number counts as missing.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Value::Integer(v) => *v as f64,
            Value::Float(v) => *v,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::Integer(72).as_f64(), Some(72.0));
        assert_eq!(Value::Float(36.6).as_f64(), Some(36.6));
        assert_eq!(Value::from(" 118.5 ").as_f64(), Some(118.5));
        assert_eq!(Value::from("Never smoker").as_f64(), None);
        assert_eq!(Value::from("NaN").as_f64(), None);
    }

    #[test]
    fn test_untagged_decoding() {
        let values: Vec<Value> = serde_json::from_str(r#"[70, 70.5, "71"]"#).unwrap();
        assert_eq!(
            values,
            vec![Value::Integer(70), Value::Float(70.5), Value::String("71".to_string())]
        );
    }
}
