//! REST surface over the analysis engine

pub mod cache;
pub mod rest;

pub use cache::ReportCache;
pub use rest::{ApiResponse, AppState, RestApi};
