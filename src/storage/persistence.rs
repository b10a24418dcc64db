use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::{Observation, ObservationStore, PatientRecord, StorageError};
use crate::config::FeedFormat;
use crate::fhir::{Bundle, FHIRConverter, FHIRResource};

/// Row-oriented feed document.
#[derive(Debug, Deserialize)]
struct RowsFeed {
    #[serde(default)]
    patients: Vec<PatientRecord>,
    observations: Vec<Observation>,
}

/// A FHIR feed is either a Bundle or a bare array of resources.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FhirFeed {
    Bundle(Bundle),
    Resources(Vec<FHIRResource>),
}

/// Load the observation feed at `path` into an immutable store.
pub fn load_store(path: impl AsRef<Path>, format: FeedFormat) -> Result<ObservationStore, StorageError> {
    let path = path.as_ref();
    let buffer = fs::read(path)?;
    debug!(path = %path.display(), bytes = buffer.len(), ?format, "Read observation feed");

    let store = decode_store(&buffer, format)?;
    info!(
        path = %path.display(),
        observations = store.len(),
        patients = store.patient_ids().len(),
        "Observation store loaded"
    );
    Ok(store)
}

/// Decode an in-memory feed document.
pub fn decode_store(buffer: &[u8], format: FeedFormat) -> Result<ObservationStore, StorageError> {
    match format {
        FeedFormat::Rows => {
            let feed: RowsFeed = serde_json::from_slice(buffer)?;
            Ok(ObservationStore::new(feed.patients, feed.observations))
        }
        FeedFormat::Fhir => {
            let bundle = match serde_json::from_slice::<FhirFeed>(buffer)? {
                FhirFeed::Bundle(bundle) => bundle,
                FhirFeed::Resources(resources) => Bundle::from_resources(resources),
            };
            let observations = bundle
                .to_observations()
                .map_err(|e| StorageError::InvalidFeed(e.to_string()))?;
            Ok(ObservationStore::new(bundle.to_patients(), observations))
        }
    }
}
