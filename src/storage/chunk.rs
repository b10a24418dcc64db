use super::{Observation, StorageError};

/// All observations for one patient, in ingestion order.
#[derive(Debug, Clone)]
pub struct PatientChunk {
    patient_id: String,
    records: Vec<Observation>,
}

impl PatientChunk {
    pub fn new(patient_id: impl Into<String>) -> Self {
        PatientChunk {
            patient_id: patient_id.into(),
            records: Vec::new(),
        }
    }

    pub fn append(&mut self, record: Observation) -> Result<(), StorageError> {
        if record.patient_id != self.patient_id {
            return Err(StorageError::PatientMismatch {
                expected: self.patient_id.clone(),
                found: record.patient_id,
            });
        }
        self.records.push(record);
        Ok(())
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn records(&self) -> &[Observation] {
        &self.records
    }

    /// Distinct signal names, in order of first appearance.
    pub fn signals(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for record in &self.records {
            if !seen.contains(&record.signal_name.as_str()) {
                seen.push(&record.signal_name);
            }
        }
        seen
    }
}
