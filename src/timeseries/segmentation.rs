//! Admission segmentation
//!
//! Orders a patient's observations in time and splits them into admission
//! episodes wherever two consecutive observations are further apart than the
//! admission gap. Episode ids count the gaps seen so far, so the first episode
//! of every patient is 0.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use crate::error::EngineError;
use crate::storage::Observation;

/// An observation with its parsed timestamp.
#[derive(Debug, Clone, Copy)]
pub struct TimedObservation<'a> {
    pub timestamp: DateTime<Utc>,
    pub observation: &'a Observation,
}

/// A contiguous run of one patient's observations.
#[derive(Debug, Clone)]
pub struct AdmissionEpisode<'a> {
    pub patient_id: &'a str,
    pub id: u32,
    /// Chronological; ties keep ingestion order.
    pub observations: Vec<TimedObservation<'a>>,
}

impl<'a> AdmissionEpisode<'a> {
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.observations.first().map(|o| o.timestamp)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.observations.last().map(|o| o.timestamp)
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Numeric readings of one signal in chronological order. Non-numeric values are dropped.
    pub fn numeric_series(&self, signal: &str) -> Vec<(DateTime<Utc>, f64)> {
        self.observations
            .iter()
            .filter(|o| o.observation.signal_name == signal)
            .filter_map(|o| o.observation.numeric_value().map(|v| (o.timestamp, v)))
            .collect()
    }

    pub fn summary(&self) -> AdmissionSummary {
        AdmissionSummary {
            episode_id: self.id,
            start: self.start(),
            end: self.end(),
            observation_count: self.len(),
        }
    }
}

/// Display-level description of an episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdmissionSummary {
    pub episode_id: u32,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub observation_count: usize,
}

/// Parse the timestamp formats found in observation exports.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

#[derive(Debug, Clone)]
pub struct AdmissionSegmenter {
    gap: Duration,
}

impl Default for AdmissionSegmenter {
    fn default() -> Self {
        AdmissionSegmenter { gap: Duration::days(1) }
    }
}

impl AdmissionSegmenter {
    pub fn new(gap: Duration) -> Self {
        AdmissionSegmenter { gap }
    }

    pub fn gap(&self) -> Duration {
        self.gap
    }

    /// Partition observations into admission episodes.
    ///
    /// Rows of several patients may be mixed; each patient's episodes are numbered
    /// independently and returned grouped by patient id. Every row must carry a
    /// parseable timestamp and a patient id.
    pub fn segment<'a>(&self, observations: &'a [Observation]) -> Result<Vec<AdmissionEpisode<'a>>, EngineError> {
        let mut timed = observations
            .iter()
            .enumerate()
            .map(|(index, observation)| {
                if observation.patient_id.trim().is_empty() {
                    return Err(EngineError::MalformedInput(format!("row {} has no patient id", index)));
                }
                let raw = observation.timestamp.as_deref().ok_or_else(|| {
                    EngineError::MalformedInput(format!(
                        "row {} for patient {} has no timestamp",
                        index, observation.patient_id
                    ))
                })?;
                let timestamp = parse_timestamp(raw).ok_or_else(|| {
                    EngineError::MalformedInput(format!(
                        "row {} for patient {} has unparseable timestamp {:?}",
                        index, observation.patient_id, raw
                    ))
                })?;
                Ok(TimedObservation { timestamp, observation })
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        // Stable: equal timestamps keep their ingestion order.
        timed.sort_by(|a, b| {
            a.observation
                .patient_id
                .cmp(&b.observation.patient_id)
                .then(a.timestamp.cmp(&b.timestamp))
        });

        let mut episodes: Vec<AdmissionEpisode<'a>> = Vec::new();
        for entry in timed {
            let patient_id = entry.observation.patient_id.as_str();
            let new_episode = match episodes.last() {
                Some(current) if current.patient_id == patient_id => {
                    let previous = current.end().unwrap_or(entry.timestamp);
                    (entry.timestamp - previous > self.gap).then_some(current.id + 1)
                }
                _ => Some(0),
            };

            match new_episode {
                Some(id) => episodes.push(AdmissionEpisode {
                    patient_id,
                    id,
                    observations: vec![entry],
                }),
                None => {
                    if let Some(current) = episodes.last_mut() {
                        current.observations.push(entry);
                    }
                }
            }
        }

        Ok(episodes)
    }
}
