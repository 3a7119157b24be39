//! Dataset-scoped lookup tables collected from common files.
//!
//! Values are stored as strings so the same tables can live in an external
//! key-value store; composite values use [`FromToScheduledStopPointId`]'s
//! `from§to` encoding.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{IntegrationError, IntegrationResult};
use crate::model::NetexEntitiesIndex;

/// Endpoints of a service link
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FromToScheduledStopPointId {
    pub from: String,
    pub to: String,
}

impl FromToScheduledStopPointId {
    /// Not legal in a NeTEx id
    pub const DELIMITER: char = '§';

    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Endpoints that survive a round trip through the `from§to` encoding
    pub fn encodable(from: impl Into<String>, to: impl Into<String>) -> IntegrationResult<Self> {
        let endpoints = Self::new(from, to);
        let valid = |segment: &str| !segment.is_empty() && !segment.contains(Self::DELIMITER);
        if valid(&endpoints.from) && valid(&endpoints.to) {
            Ok(endpoints)
        } else {
            Err(IntegrationError::Decode {
                value: endpoints.to_string(),
                details: format!(
                    "endpoints must be non-empty and must not contain '{}'",
                    Self::DELIMITER
                ),
            })
        }
    }
}

impl fmt::Display for FromToScheduledStopPointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.from, Self::DELIMITER, self.to)
    }
}

impl FromStr for FromToScheduledStopPointId {
    type Err = IntegrationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = value.split(Self::DELIMITER).collect();
        match segments.as_slice() {
            [from, to] if !from.is_empty() && !to.is_empty() => Ok(Self::new(*from, *to)),
            [_, _] => Err(IntegrationError::Decode {
                value: value.to_string(),
                details: format!("empty segment around '{}'", Self::DELIMITER),
            }),
            _ => Err(IntegrationError::Decode {
                value: value.to_string(),
                details: format!(
                    "expected 2 segments separated by '{}', found {}",
                    Self::DELIMITER,
                    segments.len()
                ),
            }),
        }
    }
}

/// Reference data shared by common files with the line files of a report
pub trait CommonDataRepository: Send + Sync {
    /// Create empty tables for a report, so line files can be validated in a
    /// dataset without common files
    fn register(&self, report_id: &str);

    /// Merge the tables of one common file; conflicting keys keep the last value
    fn collect(&self, report_id: &str, index: &NetexEntitiesIndex);

    /// Whether any reference data has been collected for the report
    fn has_data(&self, report_id: &str) -> bool;

    fn quay_id_for_scheduled_stop_point(
        &self,
        scheduled_stop_point: &str,
        report_id: &str,
    ) -> IntegrationResult<Option<String>>;

    fn from_to_scheduled_stop_point_id_for_service_link(
        &self,
        service_link: &str,
        report_id: &str,
    ) -> IntegrationResult<Option<FromToScheduledStopPointId>>;

    fn flexible_stop_place_id_for_scheduled_stop_point(
        &self,
        scheduled_stop_point: &str,
        report_id: &str,
    ) -> IntegrationResult<Option<String>>;

    fn clean_up(&self, report_id: &str);
}

#[derive(Debug, Default)]
struct ReportTables {
    quay_for_stop_point: HashMap<String, String>,
    service_link_endpoints: HashMap<String, String>,
    flexible_stop_place_for_stop_point: HashMap<String, String>,
}

impl ReportTables {
    fn is_empty(&self) -> bool {
        self.quay_for_stop_point.is_empty()
            && self.service_link_endpoints.is_empty()
            && self.flexible_stop_place_for_stop_point.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCommonDataRepository {
    reports: RwLock<HashMap<String, ReportTables>>,
}

impl InMemoryCommonDataRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_reports(&self) -> usize {
        self.reports.read().len()
    }

    fn lookup<T>(
        &self,
        report_id: &str,
        read: impl FnOnce(&ReportTables) -> IntegrationResult<Option<T>>,
    ) -> IntegrationResult<Option<T>> {
        let reports = self.reports.read();
        let tables = reports
            .get(report_id)
            .ok_or_else(|| IntegrationError::CommonDataNotCollected {
                report_id: report_id.to_string(),
            })?;
        read(tables)
    }
}

fn merge(table: &mut HashMap<String, String>, key: &str, value: String, kind: &str) {
    if let Some(previous) = table.insert(key.to_string(), value) {
        let current = &table[key];
        if previous != *current {
            warn!(
                key,
                previous = %previous,
                current = %current,
                "conflicting {} in common files, keeping the last one",
                kind
            );
        }
    }
}

impl CommonDataRepository for InMemoryCommonDataRepository {
    fn register(&self, report_id: &str) {
        self.reports
            .write()
            .entry(report_id.to_string())
            .or_default();
    }

    fn collect(&self, report_id: &str, index: &NetexEntitiesIndex) {
        let mut reports = self.reports.write();
        let tables = reports.entry(report_id.to_string()).or_default();

        for (stop_point, quay) in &index.passenger_stop_assignments {
            merge(
                &mut tables.quay_for_stop_point,
                stop_point,
                quay.clone(),
                "quay assignment",
            );
        }
        for (stop_point, stop_place) in &index.flexible_stop_assignments {
            merge(
                &mut tables.flexible_stop_place_for_stop_point,
                stop_point,
                stop_place.clone(),
                "flexible stop place assignment",
            );
        }
        for (service_link, link) in &index.service_links {
            let endpoints = match FromToScheduledStopPointId::encodable(
                link.from_point.as_str(),
                link.to_point.as_str(),
            ) {
                Ok(endpoints) => endpoints,
                Err(e) => {
                    warn!(report_id, service_link = %service_link, error = %e, "skipping service link");
                    continue;
                }
            };
            merge(
                &mut tables.service_link_endpoints,
                service_link,
                endpoints.to_string(),
                "service link",
            );
        }

        debug!(
            report_id,
            quays = tables.quay_for_stop_point.len(),
            service_links = tables.service_link_endpoints.len(),
            flexible_stop_places = tables.flexible_stop_place_for_stop_point.len(),
            "collected common data"
        );
    }

    fn has_data(&self, report_id: &str) -> bool {
        self.reports
            .read()
            .get(report_id)
            .is_some_and(|tables| !tables.is_empty())
    }

    fn quay_id_for_scheduled_stop_point(
        &self,
        scheduled_stop_point: &str,
        report_id: &str,
    ) -> IntegrationResult<Option<String>> {
        self.lookup(report_id, |tables| {
            Ok(tables.quay_for_stop_point.get(scheduled_stop_point).cloned())
        })
    }

    fn from_to_scheduled_stop_point_id_for_service_link(
        &self,
        service_link: &str,
        report_id: &str,
    ) -> IntegrationResult<Option<FromToScheduledStopPointId>> {
        self.lookup(report_id, |tables| {
            tables
                .service_link_endpoints
                .get(service_link)
                .map(|encoded| encoded.parse())
                .transpose()
        })
    }

    fn flexible_stop_place_id_for_scheduled_stop_point(
        &self,
        scheduled_stop_point: &str,
        report_id: &str,
    ) -> IntegrationResult<Option<String>> {
        self.lookup(report_id, |tables| {
            Ok(tables
                .flexible_stop_place_for_stop_point
                .get(scheduled_stop_point)
                .cloned())
        })
    }

    fn clean_up(&self, report_id: &str) {
        if self.reports.write().remove(report_id).is_some() {
            debug!(report_id, "released common data");
        }
    }
}
