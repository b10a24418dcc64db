use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::config::CacheConfig;
use crate::error::EngineError;
use crate::timeseries::query::AnalysisReport;

/// Cached analysis outcome. `None` means the patient had no findings.
pub type CachedReport = Arc<Option<AnalysisReport>>;

#[derive(Debug)]
struct CacheEntry {
    inserted: Instant,
    report: CachedReport,
}

/// Patient-keyed analysis cache with a TTL and a capacity bound.
///
/// When full, the oldest entry is evicted. Errors are never cached.
#[derive(Debug)]
pub struct ReportCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    capacity: usize,
    ttl: Duration,
}

impl ReportCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        ReportCache {
            entries: RwLock::new(HashMap::new()),
            capacity,
            ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.capacity, config.ttl())
    }

    pub fn get(&self, patient_id: &str) -> Option<CachedReport> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(patient_id)
            .filter(|entry| entry.inserted.elapsed() < self.ttl)
            .map(|entry| Arc::clone(&entry.report))
    }

    pub fn insert(&self, patient_id: &str, report: Option<AnalysisReport>) -> CachedReport {
        let report = Arc::new(report);
        if self.capacity == 0 {
            return report;
        }

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.inserted.elapsed() < ttl);

        if entries.len() >= self.capacity && !entries.contains_key(patient_id) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            patient_id.to_string(),
            CacheEntry {
                inserted: Instant::now(),
                report: Arc::clone(&report),
            },
        );
        report
    }

    pub fn get_or_compute<F>(&self, patient_id: &str, compute: F) -> Result<CachedReport, EngineError>
    where
        F: FnOnce() -> Result<Option<AnalysisReport>, EngineError>,
    {
        if let Some(report) = self.get(patient_id) {
            return Ok(report);
        }
        let report = compute()?;
        Ok(self.insert(patient_id, report))
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_get_or_compute_memoizes() {
        let cache = ReportCache::new(4, Duration::from_secs(60));
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok(None)
        };
        cache.get_or_compute("p1", compute).unwrap();
        cache.get_or_compute("p1", compute).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_errors_not_cached() {
        let cache = ReportCache::new(4, Duration::from_secs(60));
        let result = cache.get_or_compute("ghost", || Err(EngineError::PatientNotFound("ghost".to_string())));
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache = ReportCache::new(2, Duration::from_secs(60));
        cache.insert("a", None);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("b", None);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("c", None);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_expired_entries_ignored() {
        let cache = ReportCache::new(2, Duration::from_millis(1));
        cache.insert("a", None);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn test_zero_capacity_disables_cache() {
        let cache = ReportCache::new(0, Duration::from_secs(60));
        cache.insert("a", None);
        assert!(cache.is_empty());
    }
}
