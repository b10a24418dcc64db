//! Vital-sign analysis engine
//!
//! Admission-scoped analysis of a patient's observations:
//! - Segmentation into admission episodes on gaps longer than a day
//! - Out-of-range detection against physiologic bounds
//! - Instability detection from dispersion and change statistics
//! - Aggregation of both into a per-admission report

pub mod detection;
pub mod functions;
pub mod query;
pub mod segmentation;
