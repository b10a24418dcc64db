use thiserror::Error;

use crate::config::ConfigError;
use crate::fhir::FHIRError;
use crate::storage::StorageError;

/// Errors surfaced by the analysis engine to its callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// No patient directory entry and no observation rows for this identifier.
    #[error("Patient ID '{0}' is not valid or not found.")]
    PatientNotFound(String),

    /// Rows that cannot be ordered in time. Aborts analysis for the patient.
    #[error("malformed observation input: {0}")]
    MalformedInput(String),
}

/// Top-level error for the server binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("FHIR error: {0}")]
    Fhir(#[from] FHIRError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("server error: {0}")]
    Server(String),
}
