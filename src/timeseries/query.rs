use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::error::EngineError;
use crate::storage::ObservationStore;
use crate::timeseries::detection::{
    InstabilityDetector, InstabilityRecord, OutOfRangeRecord, RangeDetector, VitalSignCatalog,
};
use crate::timeseries::segmentation::{parse_timestamp, AdmissionSegmenter, AdmissionSummary};

/// Body measurements plotted alongside the vital signs.
pub const PHYSICAL_CHARACTERISTICS: [&str; 3] = [
    "Body Height",
    "Body Weight",
    "Body mass index (BMI) [Ratio]",
];

/// Findings of one admission episode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdmissionFindings {
    pub out_of_range: Vec<OutOfRangeRecord>,
    pub instabilities: Vec<InstabilityRecord>,
}

impl AdmissionFindings {
    pub fn is_empty(&self) -> bool {
        self.out_of_range.is_empty() && self.instabilities.is_empty()
    }
}

/// Episode id to findings. Only episodes with at least one finding are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisReport(BTreeMap<u32, AdmissionFindings>);

impl AnalysisReport {
    pub fn get(&self, episode_id: u32) -> Option<&AdmissionFindings> {
        self.0.get(&episode_id)
    }

    pub fn episodes(&self) -> impl Iterator<Item = (u32, &AdmissionFindings)> {
        self.0.iter().map(|(id, findings)| (*id, findings))
    }

    pub fn episode_ids(&self) -> Vec<u32> {
        self.0.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All out-of-range records, episode by episode.
    ///
    /// Not sorted across episodes; consumers that need a timeline must sort.
    pub fn out_of_range_points(&self) -> Vec<OutOfRangeRecord> {
        self.0
            .values()
            .flat_map(|findings| findings.out_of_range.iter().cloned())
            .collect()
    }

    fn insert(&mut self, episode_id: u32, findings: AdmissionFindings) {
        if !findings.is_empty() {
            self.0.insert(episode_id, findings);
        }
    }
}

/// Inclusive time bounds for plotting data.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SeriesWindow {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl SeriesWindow {
    fn bounds(&self) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), EngineError> {
        let parse = |raw: &Option<String>| -> Result<Option<DateTime<Utc>>, EngineError> {
            raw.as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(|s| {
                    parse_window_bound(s)
                        .ok_or_else(|| EngineError::MalformedInput(format!("invalid date bound {:?}", s)))
                })
                .transpose()
        };
        Ok((parse(&self.start)?, parse(&self.end)?))
    }
}

/// A bound may be a bare year, a date, or a full timestamp.
fn parse_window_bound(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.len() == 4 {
        let year = raw.parse::<i32>().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1)?
            .and_hms_opt(0, 0, 0)
            .map(|ts| ts.and_utc());
    }
    parse_timestamp(raw)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Plotting data for one signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VitalSeries {
    pub signal: String,
    pub unit: Option<String>,
    pub points: Vec<SeriesPoint>,
}

/// Runs segmentation and both detectors over one patient's observations.
///
/// Holds configuration only. The store is passed to every call and nothing is
/// cached between calls.
#[derive(Debug, Clone)]
pub struct AnalysisEngine {
    catalog: VitalSignCatalog,
    segmenter: AdmissionSegmenter,
    range_detector: RangeDetector,
    instability_detector: InstabilityDetector,
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

impl AnalysisEngine {
    pub fn new(config: &AnalysisConfig) -> Self {
        AnalysisEngine {
            catalog: config.vital_signs.clone(),
            segmenter: AdmissionSegmenter::new(config.admission_gap()),
            range_detector: RangeDetector::from_catalog(&config.vital_signs),
            instability_detector: InstabilityDetector::from_catalog(&config.vital_signs),
        }
    }

    pub fn catalog(&self) -> &VitalSignCatalog {
        &self.catalog
    }

    /// Per-admission out-of-range and instability findings.
    ///
    /// `Ok(None)` when no episode has any finding.
    pub fn analyze_vitals(
        &self,
        store: &ObservationStore,
        patient_id: &str,
    ) -> Result<Option<AnalysisReport>, EngineError> {
        let observations = store.observations_for(patient_id)?;
        let episodes = self.segmenter.segment(observations)?;

        let mut report = AnalysisReport::default();
        for episode in &episodes {
            let findings = AdmissionFindings {
                out_of_range: self.range_detector.detect(episode),
                instabilities: self.instability_detector.detect(episode),
            };
            debug!(
                patient_id,
                episode_id = episode.id,
                observations = episode.len(),
                out_of_range = findings.out_of_range.len(),
                instabilities = findings.instabilities.len(),
                "Analyzed admission"
            );
            report.insert(episode.id, findings);
        }

        Ok((!report.is_empty()).then_some(report))
    }

    /// Flat list of out-of-range readings for chart overlays.
    pub fn extract_out_of_range_points(
        &self,
        store: &ObservationStore,
        patient_id: &str,
    ) -> Result<Vec<OutOfRangeRecord>, EngineError> {
        Ok(self
            .analyze_vitals(store, patient_id)?
            .map(|report| report.out_of_range_points())
            .unwrap_or_default())
    }

    pub fn admissions(
        &self,
        store: &ObservationStore,
        patient_id: &str,
    ) -> Result<Vec<AdmissionSummary>, EngineError> {
        let observations = store.observations_for(patient_id)?;
        Ok(self
            .segmenter
            .segment(observations)?
            .iter()
            .map(|episode| episode.summary())
            .collect())
    }

    /// Time series of the vital signs and body measurements within `window`.
    ///
    /// Rows without a parseable timestamp or numeric value are left out.
    pub fn vital_series(
        &self,
        store: &ObservationStore,
        patient_id: &str,
        window: &SeriesWindow,
    ) -> Result<Vec<VitalSeries>, EngineError> {
        let observations = store.observations_for(patient_id)?;
        let (start, end) = window.bounds()?;

        let mut signals: Vec<&str> = PHYSICAL_CHARACTERISTICS.to_vec();
        signals.extend(self.catalog.names());

        let mut series = Vec::new();
        for signal in signals {
            let mut points: Vec<SeriesPoint> = observations
                .iter()
                .filter(|o| o.signal_name == signal)
                .filter_map(|o| {
                    let timestamp = o.timestamp.as_deref().and_then(parse_timestamp)?;
                    let value = o.numeric_value()?;
                    Some(SeriesPoint { timestamp, value })
                })
                .filter(|p| start.map_or(true, |s| p.timestamp >= s))
                .filter(|p| end.map_or(true, |e| p.timestamp <= e))
                .collect();
            if points.is_empty() {
                continue;
            }
            points.sort_by_key(|p| p.timestamp);

            let unit = observations
                .iter()
                .filter(|o| o.signal_name == signal)
                .find_map(|o| o.unit.clone().filter(|u| !u.is_empty()));
            series.push(VitalSeries {
                signal: signal.to_string(),
                unit,
                points,
            });
        }

        Ok(series)
    }
}
