//! FHIR ingest adapter
//!
//! Converts FHIR R4 `Observation` and `Patient` resources into the rows the
//! observation store holds. Only the fields the analysis needs are modelled.

pub mod conversion;
pub mod resources;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use conversion::FHIRConverter;
pub use resources::{Bundle, FHIRResource, ObservationResource, PatientResource};

#[derive(Debug, Error)]
pub enum FHIRError {
    #[error("conversion error: {0}")]
    ConversionError(String),
    #[error("validation error: {0}")]
    ValidationError(String),
}

/// LOINC codes of the tracked vital signs, used when a coding carries no display text.
pub const VITAL_SIGN_LOINC: [(&str, &str); 4] = [
    ("8462-4", "Diastolic Blood Pressure"),
    ("8480-6", "Systolic Blood Pressure"),
    ("8867-4", "Heart rate"),
    ("9279-1", "Respiratory rate"),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeableConcept {
    #[serde(default)]
    pub coding: Vec<Coding>,
    pub text: Option<String>,
}

impl CodeableConcept {
    /// Signal name: first coding display, then the free text, then a LOINC lookup, then the raw code.
    pub fn signal_name(&self) -> Option<String> {
        if let Some(display) = self.coding.iter().find_map(|c| c.display.clone()) {
            return Some(display);
        }
        if let Some(text) = &self.text {
            return Some(text.clone());
        }
        let code = self.coding.iter().find_map(|c| c.code.as_deref())?;
        let name = VITAL_SIGN_LOINC
            .iter()
            .find(|(loinc, _)| *loinc == code)
            .map(|(_, name)| name.to_string())
            .unwrap_or_else(|| code.to_string());
        Some(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coding {
    pub system: Option<String>,
    pub code: Option<String>,
    pub display: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    pub reference: Option<String>,
}

impl Reference {
    /// Bare patient id from `Patient/<id>` or `urn:uuid:<id>` references.
    pub fn patient_id(&self) -> Option<String> {
        let reference = self.reference.as_deref()?;
        let id = reference
            .strip_prefix("Patient/")
            .or_else(|| reference.strip_prefix("urn:uuid:"))
            .unwrap_or(reference);
        (!id.is_empty()).then(|| id.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quantity {
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_name_fallbacks() {
        let with_display: CodeableConcept = serde_json::from_str(
            r#"{"coding":[{"system":"http://loinc.org","code":"8867-4","display":"Heart rate"}]}"#,
        )
        .unwrap();
        assert_eq!(with_display.signal_name().as_deref(), Some("Heart rate"));

        let code_only: CodeableConcept =
            serde_json::from_str(r#"{"coding":[{"code":"9279-1"}]}"#).unwrap();
        assert_eq!(code_only.signal_name().as_deref(), Some("Respiratory rate"));

        let unknown: CodeableConcept =
            serde_json::from_str(r#"{"coding":[{"code":"2708-6"}]}"#).unwrap();
        assert_eq!(unknown.signal_name().as_deref(), Some("2708-6"));

        assert_eq!(CodeableConcept::default().signal_name(), None);
    }

    #[test]
    fn test_reference_patient_id() {
        let r = |s: &str| Reference { reference: Some(s.to_string()) };
        assert_eq!(r("Patient/123").patient_id().as_deref(), Some("123"));
        assert_eq!(r("urn:uuid:abc-def").patient_id().as_deref(), Some("abc-def"));
        assert_eq!(r("Patient/").patient_id(), None);
    }
}
