//! Dataset-scoped registry of declared ids.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tracing::debug;

/// Ids seen so far in a dataset run, keyed by report id.
///
/// State for a report is created on first use and lives until
/// [`clean_up`](NetexIdRepository::clean_up).
pub trait NetexIdRepository: Send + Sync {
    /// Ids of `local_ids` already declared by an earlier file of the same
    /// report. The local ids are then added to the accumulated set.
    fn duplicate_netex_ids(
        &self,
        report_id: &str,
        filename: &str,
        local_ids: &HashSet<String>,
    ) -> HashSet<String>;

    fn shared_netex_ids(&self, report_id: &str) -> HashSet<String>;

    fn add_shared_netex_ids(&self, report_id: &str, ids: &HashSet<String>);

    fn has_shared_netex_id(&self, report_id: &str, id: &str) -> bool;

    fn clean_up(&self, report_id: &str);
}

#[derive(Debug, Default)]
struct ReportIds {
    accumulated: HashSet<String>,
    shared: HashSet<String>,
}

/// In-process repository guarded by one coarse lock
#[derive(Debug, Default)]
pub struct InMemoryNetexIdRepository {
    reports: Mutex<HashMap<String, ReportIds>>,
}

impl InMemoryNetexIdRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of reports currently holding state
    pub fn active_reports(&self) -> usize {
        self.reports.lock().len()
    }
}

impl NetexIdRepository for InMemoryNetexIdRepository {
    fn duplicate_netex_ids(
        &self,
        report_id: &str,
        filename: &str,
        local_ids: &HashSet<String>,
    ) -> HashSet<String> {
        let mut reports = self.reports.lock();
        let report = reports.entry(report_id.to_string()).or_default();

        let duplicates: HashSet<String> = local_ids
            .intersection(&report.accumulated)
            .cloned()
            .collect();
        report.accumulated.extend(local_ids.iter().cloned());

        debug!(
            report_id,
            filename,
            ids = local_ids.len(),
            duplicates = duplicates.len(),
            "accumulated netex ids"
        );
        duplicates
    }

    fn shared_netex_ids(&self, report_id: &str) -> HashSet<String> {
        self.reports
            .lock()
            .get(report_id)
            .map(|report| report.shared.clone())
            .unwrap_or_default()
    }

    fn add_shared_netex_ids(&self, report_id: &str, ids: &HashSet<String>) {
        let mut reports = self.reports.lock();
        reports
            .entry(report_id.to_string())
            .or_default()
            .shared
            .extend(ids.iter().cloned());
    }

    fn has_shared_netex_id(&self, report_id: &str, id: &str) -> bool {
        self.reports
            .lock()
            .get(report_id)
            .is_some_and(|report| report.shared.contains(id))
    }

    fn clean_up(&self, report_id: &str) {
        if self.reports.lock().remove(report_id).is_some() {
            debug!(report_id, "released netex id state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ids(values: &[&str]) -> HashSet<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn test_duplicates_accumulate_until_clean_up() {
        let repository = InMemoryNetexIdRepository::new();
        let a = ids(&["X:Line:1", "X:Route:1"]);
        let b = ids(&["X:Route:1", "X:Route:2"]);

        assert!(repository.duplicate_netex_ids("r", "a.xml", &a).is_empty());
        assert_eq!(
            repository.duplicate_netex_ids("r", "b.xml", &b),
            ids(&["X:Route:1"])
        );
        assert_eq!(repository.duplicate_netex_ids("r", "a.xml", &a), a);

        repository.clean_up("r");
        assert!(repository.duplicate_netex_ids("r", "a.xml", &a).is_empty());
    }

    #[test]
    fn test_reports_are_isolated() {
        let repository = InMemoryNetexIdRepository::new();
        let a = ids(&["X:Line:1"]);

        repository.duplicate_netex_ids("r1", "a.xml", &a);
        assert!(repository.duplicate_netex_ids("r2", "a.xml", &a).is_empty());

        repository.add_shared_netex_ids("r1", &a);
        assert!(repository.has_shared_netex_id("r1", "X:Line:1"));
        assert!(!repository.has_shared_netex_id("r2", "X:Line:1"));
        assert!(repository.shared_netex_ids("r2").is_empty());
    }

    #[test]
    fn test_clean_up_releases_both_maps() {
        let repository = InMemoryNetexIdRepository::new();
        repository.duplicate_netex_ids("r", "a.xml", &ids(&["X:Line:1"]));
        repository.add_shared_netex_ids("r", &ids(&["X:StopPlace:1"]));
        assert_eq!(repository.active_reports(), 1);

        repository.clean_up("r");
        assert_eq!(repository.active_reports(), 0);
        assert!(repository.shared_netex_ids("r").is_empty());
    }

    #[test]
    fn test_concurrent_check_and_commit() {
        let repository = Arc::new(InMemoryNetexIdRepository::new());
        let same = ids(&["X:Line:1"]);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let repository = Arc::clone(&repository);
                let same = same.clone();
                std::thread::spawn(move || {
                    repository
                        .duplicate_netex_ids("r", &format!("{}.xml", i), &same)
                        .len()
                })
            })
            .collect();

        let reported: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        // Exactly one caller sees the id first
        assert_eq!(reported, 7);
    }
}
