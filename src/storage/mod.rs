//! Observation store
//!
//! Holds every patient's observation rows, partitioned by patient:
//! - Loaded once at startup and never mutated afterwards
//! - Identifier-keyed patient directory
//! - Raw values and timestamps kept as delivered; coercion happens downstream

mod chunk;
pub mod persistence;

pub use chunk::PatientChunk;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::error::EngineError;
use crate::Value;

/// One time-stamped physiological measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(alias = "PATIENT")]
    pub patient_id: String,
    /// Raw timestamp text. Parsed by the admission segmenter.
    #[serde(alias = "DATE", default)]
    pub timestamp: Option<String>,
    #[serde(alias = "DESCRIPTION")]
    pub signal_name: String,
    #[serde(alias = "VALUE", default)]
    pub value: Option<Value>,
    #[serde(alias = "UNITS", default)]
    pub unit: Option<String>,
}

impl Observation {
    pub fn new(
        patient_id: impl Into<String>,
        timestamp: impl Into<String>,
        signal_name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Observation {
            patient_id: patient_id.into(),
            timestamp: Some(timestamp.into()),
            signal_name: signal_name.into(),
            value: Some(value.into()),
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn numeric_value(&self) -> Option<f64> {
        self.value.as_ref().and_then(Value::as_f64)
    }
}

/// Directory entry for a known patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(alias = "Id")]
    pub id: String,
    #[serde(alias = "FIRST", default)]
    pub first_name: Option<String>,
    #[serde(alias = "LAST", default)]
    pub last_name: Option<String>,
}

impl PatientRecord {
    pub fn new(id: impl Into<String>) -> Self {
        PatientRecord {
            id: id.into(),
            first_name: None,
            last_name: None,
        }
    }

    /// Full name with the numeric suffixes synthetic exports append to names removed.
    pub fn display_name(&self) -> Option<String> {
        let strip = |name: &Option<String>| {
            name.as_deref()
                .map(|n| n.chars().filter(|c| !c.is_ascii_digit()).collect::<String>())
                .filter(|n| !n.is_empty())
        };
        match (strip(&self.first_name), strip(&self.last_name)) {
            (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
            (Some(name), None) | (None, Some(name)) => Some(name),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("observation for patient {found} appended to partition of {expected}")]
    PatientMismatch { expected: String, found: String },
    #[error("failed to read feed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode feed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid feed: {0}")]
    InvalidFeed(String),
}

/// Immutable, patient-indexed observation table.
#[derive(Debug, Default)]
pub struct ObservationStore {
    patients: HashMap<String, PatientRecord>,
    chunks: HashMap<String, PatientChunk>,
    total: usize,
}

impl ObservationStore {
    pub fn new(patients: Vec<PatientRecord>, observations: Vec<Observation>) -> Self {
        let mut chunks: HashMap<String, PatientChunk> = HashMap::new();
        let mut total = 0;

        for record in observations {
            let chunk = chunks
                .entry(record.patient_id.clone())
                .or_insert_with(|| PatientChunk::new(record.patient_id.clone()));
            // Keyed by the record's own patient id, so the append cannot mismatch.
            if chunk.append(record).is_ok() {
                total += 1;
            }
        }

        let patients = patients
            .into_iter()
            .map(|patient| (patient.id.clone(), patient))
            .collect();

        ObservationStore {
            patients,
            chunks,
            total,
        }
    }

    pub fn from_observations(observations: Vec<Observation>) -> Self {
        Self::new(Vec::new(), observations)
    }

    /// All rows for one patient, in ingestion order.
    ///
    /// A patient listed in the directory without observations yields an empty slice.
    pub fn observations_for(&self, patient_id: &str) -> Result<&[Observation], EngineError> {
        match self.chunks.get(patient_id) {
            Some(chunk) => Ok(chunk.records()),
            None if self.patients.contains_key(patient_id) => Ok(&[]),
            None => Err(EngineError::PatientNotFound(patient_id.to_string())),
        }
    }

    pub fn patient(&self, patient_id: &str) -> Option<&PatientRecord> {
        self.patients.get(patient_id)
    }

    pub fn contains_patient(&self, patient_id: &str) -> bool {
        self.patients.contains_key(patient_id) || self.chunks.contains_key(patient_id)
    }

    /// Known patient ids, sorted.
    pub fn patient_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .patients
            .keys()
            .chain(self.chunks.keys())
            .map(String::as_str)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn signals_for(&self, patient_id: &str) -> Vec<&str> {
        self.chunks
            .get(patient_id)
            .map(PatientChunk::signals)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
