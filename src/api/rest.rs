use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{info, warn};
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::Filter;

use crate::api::cache::{CachedReport, ReportCache};
use crate::error::EngineError;
use crate::storage::ObservationStore;
use crate::timeseries::query::{AnalysisEngine, SeriesWindow};

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// Shared, read-only state behind every route.
#[derive(Debug)]
pub struct AppState {
    pub store: Arc<ObservationStore>,
    pub engine: AnalysisEngine,
    pub cache: ReportCache,
}

impl AppState {
    fn analysis(&self, patient_id: &str) -> Result<CachedReport, EngineError> {
        self.cache
            .get_or_compute(patient_id, || self.engine.analyze_vitals(&self.store, patient_id))
    }
}

pub struct RestApi {
    state: Arc<AppState>,
}

impl RestApi {
    pub fn new(store: Arc<ObservationStore>, engine: AnalysisEngine, cache: ReportCache) -> Self {
        RestApi {
            state: Arc::new(AppState { store, engine, cache }),
        }
    }

    pub fn routes(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        self.get_analysis()
            .or(self.get_out_of_range())
            .or(self.get_admissions())
            .or(self.get_vitals())
    }

    fn get_analysis(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let state = Arc::clone(&self.state);

        warp::path!("patients" / String / "analysis")
            .and(warp::get())
            .and_then(move |patient_id: String| {
                let state = Arc::clone(&state);
                async move {
                    info!(patient_id = %patient_id, "Vital-sign analysis requested");
                    let reply = match state.analysis(&patient_id) {
                        Ok(report) => {
                            let message = if report.is_some() {
                                "Vital-sign analysis complete"
                            } else {
                                "No abnormal or unstable vital signs detected"
                            };
                            let data = serde_json::json!({
                                "patient_id": patient_id,
                                "patient_name": state.store.patient(&patient_id).and_then(|p| p.display_name()),
                                "analysis": &*report,
                            });
                            success(message, &data)
                        }
                        Err(err) => failure(&patient_id, &err),
                    };
                    Ok::<WithStatus<Json>, Infallible>(reply)
                }
            })
    }

    fn get_out_of_range(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let state = Arc::clone(&self.state);

        warp::path!("patients" / String / "out-of-range")
            .and(warp::get())
            .and_then(move |patient_id: String| {
                let state = Arc::clone(&state);
                async move {
                    let reply = match state.analysis(&patient_id) {
                        Ok(report) => {
                            let points = (*report)
                                .as_ref()
                                .map(|r| r.out_of_range_points())
                                .unwrap_or_default();
                            success(format!("{} out-of-range readings", points.len()), &points)
                        }
                        Err(err) => failure(&patient_id, &err),
                    };
                    Ok::<WithStatus<Json>, Infallible>(reply)
                }
            })
    }

    fn get_admissions(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let state = Arc::clone(&self.state);

        warp::path!("patients" / String / "admissions")
            .and(warp::get())
            .and_then(move |patient_id: String| {
                let state = Arc::clone(&state);
                async move {
                    let reply = match state.engine.admissions(&state.store, &patient_id) {
                        Ok(admissions) => success(format!("{} admissions", admissions.len()), &admissions),
                        Err(err) => failure(&patient_id, &err),
                    };
                    Ok::<WithStatus<Json>, Infallible>(reply)
                }
            })
    }

    fn get_vitals(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let state = Arc::clone(&self.state);

        warp::path!("patients" / String / "vitals")
            .and(warp::get())
            .and(warp::query::<SeriesWindow>())
            .and_then(move |patient_id: String, window: SeriesWindow| {
                let state = Arc::clone(&state);
                async move {
                    let reply = match state.engine.vital_series(&state.store, &patient_id, &window) {
                        Ok(series) if series.is_empty() => success(
                            format!("No vital signs available for patient {}", patient_id),
                            &series,
                        ),
                        Ok(series) => success(format!("{} series", series.len()), &series),
                        Err(err) => failure(&patient_id, &err),
                    };
                    Ok::<WithStatus<Json>, Infallible>(reply)
                }
            })
    }
}

fn reply(status: StatusCode, outcome: &str, message: String, data: Option<serde_json::Value>) -> WithStatus<Json> {
    let response = ApiResponse {
        status: outcome.to_string(),
        message,
        data,
    };
    warp::reply::with_status(warp::reply::json(&response), status)
}

fn success<T: Serialize>(message: impl Into<String>, data: &T) -> WithStatus<Json> {
    match serde_json::to_value(data) {
        Ok(value) => reply(StatusCode::OK, "success", message.into(), Some(value)),
        Err(e) => reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            "error",
            format!("Failed to encode response: {}", e),
            None,
        ),
    }
}

fn failure(patient_id: &str, err: &EngineError) -> WithStatus<Json> {
    let status = match err {
        EngineError::PatientNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::MalformedInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    warn!(patient_id, error = %err, "Request failed");
    reply(status, "error", err.to_string(), None)
}
