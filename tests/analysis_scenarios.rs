use chrono::Duration;
use pretty_assertions::assert_eq;

use vitalwatch::timeseries::detection::{InstabilityReasons, OutOfRangeRecord};
use vitalwatch::timeseries::segmentation::{parse_timestamp, AdmissionSegmenter};
use vitalwatch::{AnalysisEngine, EngineError, Observation, ObservationStore};

fn hr(patient: &str, ts: &str, value: f64) -> Observation {
    Observation::new(patient, ts, "Heart rate", value).with_unit("/min")
}

fn mixed_patient() -> Vec<Observation> {
    vec![
        hr("p", "2024-03-10T06:00:00Z", 88.0),
        Observation::new("p", "2024-03-01T08:00:00Z", "Respiratory rate", 16.0),
        hr("p", "2024-03-01T08:00:00Z", 70.0),
        hr("p", "2024-03-02T07:00:00Z", 74.0),
        Observation::new("p", "2024-03-02T07:30:00Z", "Body Weight", 80.0),
        hr("p", "2024-03-04T07:30:00Z", 76.0),
        hr("p", "2024-03-09T07:30:00Z", 79.0),
        hr("p", "2024-03-10T07:00:00Z", 81.0),
    ]
}

#[test]
fn partition_covers_every_observation_once() {
    let rows = mixed_patient();
    let episodes = AdmissionSegmenter::default().segment(&rows).unwrap();

    let total: usize = episodes.iter().map(|e| e.len()).sum();
    assert_eq!(total, rows.len());

    for row in &rows {
        let hits = episodes
            .iter()
            .flat_map(|e| e.observations.iter())
            .filter(|o| std::ptr::eq(o.observation, row))
            .count();
        assert_eq!(hits, 1);
    }

    let ids: Vec<u32> = episodes.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
}

#[test]
fn gaps_respected_within_and_between_episodes() {
    let rows = mixed_patient();
    let episodes = AdmissionSegmenter::default().segment(&rows).unwrap();
    let day = Duration::days(1);

    for episode in &episodes {
        for pair in episode.observations.windows(2) {
            assert!(pair[1].timestamp - pair[0].timestamp <= day);
        }
    }
    for pair in episodes.windows(2) {
        let (last, first) = (pair[0].end().unwrap(), pair[1].start().unwrap());
        assert!(first - last > day);
    }
}

#[test]
fn range_bounds_are_normal_and_epsilon_beyond_is_flagged() {
    let epsilon = 1e-6;
    let rows = vec![
        hr("p", "2024-01-01T00:00:00Z", 60.0),
        hr("p", "2024-01-01T00:10:00Z", 100.0),
        hr("p", "2024-01-01T00:20:00Z", 60.0 - epsilon),
        hr("p", "2024-01-01T00:30:00Z", 100.0 + epsilon),
    ];
    let store = ObservationStore::from_observations(rows);
    let points = AnalysisEngine::default().extract_out_of_range_points(&store, "p").unwrap();
    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    assert_eq!(values, vec![60.0 - epsilon, 100.0 + epsilon]);
}

#[test]
fn single_reading_produces_no_instability() {
    let store = ObservationStore::from_observations(vec![
        hr("p", "2024-01-01T00:00:00Z", 70.0),
        Observation::new("p", "2024-01-01T00:00:00Z", "Respiratory rate", 40.0),
    ]);
    let report = AnalysisEngine::default().analyze_vitals(&store, "p").unwrap().unwrap();
    let findings = report.get(0).unwrap();
    assert!(findings.instabilities.is_empty());
    assert_eq!(findings.out_of_range.len(), 1);
    assert_eq!(findings.out_of_range[0].vital_sign, "Respiratory rate");
}

#[test]
fn pipeline_is_idempotent() {
    let store = ObservationStore::from_observations(mixed_patient());
    let engine = AnalysisEngine::default();
    let first = serde_json::to_string(&engine.analyze_vitals(&store, "p").unwrap()).unwrap();
    let second = serde_json::to_string(&engine.analyze_vitals(&store, "p").unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn scenario_two_admissions_with_tachycardic_jump() {
    let store = ObservationStore::from_observations(vec![
        hr("P", "2024-01-01T08:00:00Z", 70.0),
        hr("P", "2024-01-01T14:00:00Z", 72.0),
        hr("P", "2024-01-05T08:00:00Z", 75.0),
        hr("P", "2024-01-05T10:00:00Z", 140.0),
    ]);
    let engine = AnalysisEngine::default();
    assert_eq!(engine.admissions(&store, "P").unwrap().len(), 2);

    let report = engine.analyze_vitals(&store, "P").unwrap().unwrap();
    assert_eq!(report.episode_ids(), vec![1]);

    let findings = report.get(1).unwrap();
    assert_eq!(
        findings.out_of_range,
        vec![OutOfRangeRecord {
            vital_sign: "Heart rate".to_string(),
            timestamp: parse_timestamp("2024-01-05T10:00:00Z").unwrap(),
            value: 140.0,
        }]
    );

    let instability = &findings.instabilities[0];
    assert_eq!(instability.vital_sign, "Heart rate");
    assert_eq!(instability.sudden_change_count, 1);
    assert_eq!(
        instability.reasons,
        InstabilityReasons {
            cv_exceeds_threshold: true,
            sudden_fluctuations_exceed: false,
            high_local_variability: true,
        }
    );
}

#[test]
fn scenario_single_observation_patient() {
    let store = ObservationStore::from_observations(vec![hr("solo", "2024-01-01T08:00:00Z", 45.0)]);
    let engine = AnalysisEngine::default();
    assert_eq!(engine.admissions(&store, "solo").unwrap().len(), 1);

    let report = engine.analyze_vitals(&store, "solo").unwrap().unwrap();
    let findings = report.get(0).unwrap();
    assert!(findings.instabilities.is_empty());
    assert_eq!(findings.out_of_range[0].value, 45.0);
}

#[test]
fn scenario_no_tracked_vital_signs() {
    let store = ObservationStore::from_observations(vec![
        Observation::new("q", "2024-01-01T08:00:00Z", "Body Height", 180.0),
        Observation::new("q", "2024-01-01T08:00:00Z", "Tobacco smoking status", "Never smoker"),
    ]);
    let engine = AnalysisEngine::default();
    assert_eq!(engine.analyze_vitals(&store, "q").unwrap(), None);
    assert_eq!(engine.extract_out_of_range_points(&store, "q").unwrap(), vec![]);
}

#[test]
fn unknown_patient_is_recoverable_error() {
    let store = ObservationStore::from_observations(mixed_patient());
    assert_eq!(
        AnalysisEngine::default().analyze_vitals(&store, "nobody"),
        Err(EngineError::PatientNotFound("nobody".to_string()))
    );
}

#[test]
fn flattened_points_follow_episode_order() {
    let store = ObservationStore::from_observations(vec![
        hr("p", "2024-01-10T08:00:00Z", 130.0),
        hr("p", "2024-01-01T08:00:00Z", 40.0),
        Observation::new("p", "2024-01-01T07:00:00Z", "Systolic Blood Pressure", 150.0),
    ]);
    let points = AnalysisEngine::default().extract_out_of_range_points(&store, "p").unwrap();
    let flagged: Vec<(&str, f64)> = points.iter().map(|p| (p.vital_sign.as_str(), p.value)).collect();
    assert_eq!(
        flagged,
        vec![("Systolic Blood Pressure", 150.0), ("Heart rate", 40.0), ("Heart rate", 130.0)]
    );
}
