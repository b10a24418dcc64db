use super::FHIRError;
use crate::storage::{Observation, PatientRecord};

/// Converts FHIR resources into observation-store rows.
pub trait FHIRConverter {
    fn to_observations(&self) -> Result<Vec<Observation>, FHIRError>;

    fn to_patients(&self) -> Vec<PatientRecord> {
        Vec::new()
    }
}
