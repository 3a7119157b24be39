//! Dataset-level validation.
//!
//! A dataset run owns one report id. Common files are validated first, one at
//! a time in name order, so that their shared ids and reference data are
//! complete before any line file is looked at. Line files are then validated
//! concurrently:
//! - **Sync CPU-bound work**: each file runs on the blocking pool
//! - **Bounded concurrency**: a semaphore caps the files in flight
//! - **Completion**: every task is awaited before the report is returned,
//!   even when one of them fails
//! - **Cancellation**: dropping the run leaves spawned tasks running; each of
//!   them holds the report scope, so the report is released after the last one
//!
//! With concurrent line files, which of two files declaring the same id gets
//! the duplicate entry depends on scheduling. Setting
//! `max_concurrent_validations` to 1 validates line files one at a time in
//! name order, and the later name always gets it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, ValidationError};
use crate::file_discovery::FileDiscovery;
use crate::repository::{
    CommonDataRepository, InMemoryCommonDataRepository, InMemoryNetexIdRepository,
    NetexIdRepository,
};
use crate::report::ValidationReport;
use crate::runner::{NetexValidatorsRunner, NetexValidatorsRunnerBuilder, ValidationOptions};
use crate::tree::ValidationTree;
use crate::validators::ExternalReferenceValidator;

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetConfig {
    /// Number of line files validated at the same time; 1 runs them in name order
    pub max_concurrent_validations: usize,
    pub options: ValidationOptions,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            max_concurrent_validations: num_cpus::get(),
            options: ValidationOptions::default(),
        }
    }
}

/// One file of a dataset, already read into memory
#[derive(Debug, Clone)]
pub struct DatasetFile {
    pub name: String,
    pub content: Vec<u8>,
}

impl DatasetFile {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Outcome of a dataset run
#[derive(Debug, Clone)]
pub struct DatasetResults {
    pub report: ValidationReport,
    pub common_files: usize,
    pub line_files: usize,
    pub duration: Duration,
}

impl DatasetResults {
    pub fn total_files(&self) -> usize {
        self.common_files + self.line_files
    }
}

/// Registers a report in both repositories and releases it when dropped,
/// whichever way the run ends.
pub struct ReportScope {
    report_id: String,
    id_repository: Arc<dyn NetexIdRepository>,
    common_data_repository: Arc<dyn CommonDataRepository>,
}

impl ReportScope {
    pub fn acquire(
        report_id: impl Into<String>,
        id_repository: Arc<dyn NetexIdRepository>,
        common_data_repository: Arc<dyn CommonDataRepository>,
    ) -> Self {
        let report_id = report_id.into();
        common_data_repository.register(&report_id);
        Self {
            report_id,
            id_repository,
            common_data_repository,
        }
    }

    pub fn report_id(&self) -> &str {
        &self.report_id
    }
}

impl Drop for ReportScope {
    fn drop(&mut self) {
        self.id_repository.clean_up(&self.report_id);
        self.common_data_repository.clean_up(&self.report_id);
        debug!(report_id = %self.report_id, "released report state");
    }
}

/// Validates whole datasets under a fresh report id per run.
///
/// Duplicate ids across concurrently validated line files are reported once,
/// in whichever file is validated second.
pub struct DatasetValidator {
    runner: Arc<NetexValidatorsRunner>,
    id_repository: Arc<dyn NetexIdRepository>,
    common_data_repository: Arc<dyn CommonDataRepository>,
    config: DatasetConfig,
}

impl DatasetValidator {
    /// `runner` must be wired to the same repositories
    pub fn new(
        runner: Arc<NetexValidatorsRunner>,
        id_repository: Arc<dyn NetexIdRepository>,
        common_data_repository: Arc<dyn CommonDataRepository>,
        config: DatasetConfig,
    ) -> Self {
        Self {
            runner,
            id_repository,
            common_data_repository,
            config,
        }
    }

    /// Standard validator chain over in-memory repositories.
    ///
    /// `customize` sees the runner builder after the default validators are
    /// registered, e.g. to add schema gates or an entry factory.
    pub fn in_memory<F>(
        tree: Arc<ValidationTree>,
        external_validators: Vec<Arc<dyn ExternalReferenceValidator>>,
        config: DatasetConfig,
        customize: F,
    ) -> Self
    where
        F: FnOnce(NetexValidatorsRunnerBuilder) -> NetexValidatorsRunnerBuilder,
    {
        let id_repository: Arc<dyn NetexIdRepository> = Arc::new(InMemoryNetexIdRepository::new());
        let common_data_repository: Arc<dyn CommonDataRepository> =
            Arc::new(InMemoryCommonDataRepository::new());
        let builder = NetexValidatorsRunner::builder().with_default_validators(
            tree,
            Arc::clone(&id_repository),
            Arc::clone(&common_data_repository),
            external_validators,
        );
        let runner = Arc::new(customize(builder).build());
        Self::new(runner, id_repository, common_data_repository, config)
    }

    pub fn runner(&self) -> &NetexValidatorsRunner {
        &self.runner
    }

    /// Discover, read and validate every file under `path`
    pub async fn validate_path(
        &self,
        codespace: &str,
        path: &Path,
        file_discovery: &FileDiscovery,
    ) -> Result<DatasetResults> {
        let paths = file_discovery.discover_files(path).await?;
        debug!(path = %path.display(), files = paths.len(), "discovered dataset files");

        let mut files = Vec::with_capacity(paths.len());
        for file in paths {
            let content = tokio::fs::read(&file).await?;
            files.push(DatasetFile::new(display_name(path, &file), content));
        }
        self.validate_files(codespace, files).await
    }

    pub async fn validate_files(
        &self,
        codespace: &str,
        files: Vec<DatasetFile>,
    ) -> Result<DatasetResults> {
        let start = Instant::now();
        // Every task holds a clone; the report is released after the last one
        let scope = Arc::new(ReportScope::acquire(
            Uuid::new_v4().to_string(),
            Arc::clone(&self.id_repository),
            Arc::clone(&self.common_data_repository),
        ));
        let report_id = scope.report_id().to_string();

        let (mut common_files, mut line_files): (Vec<_>, Vec<_>) = files
            .into_iter()
            .partition(|file| self.runner.is_common_file(&file.name));
        common_files.sort_by(|a, b| a.name.cmp(&b.name));
        line_files.sort_by(|a, b| a.name.cmp(&b.name));

        info!(
            codespace,
            report_id = %report_id,
            common_files = common_files.len(),
            line_files = line_files.len(),
            "validating dataset"
        );

        let common_count = common_files.len();
        let line_count = line_files.len();
        let mut report = ValidationReport::new(codespace, &report_id);

        for file in common_files {
            report.merge(self.validate_one(codespace, &scope, file).await?);
        }

        if self.config.max_concurrent_validations <= 1 {
            for file in line_files {
                report.merge(self.validate_one(codespace, &scope, file).await?);
            }
        } else {
            let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_validations));
            let tasks: Vec<_> = line_files
                .into_iter()
                .map(|file| {
                    let semaphore = Arc::clone(&semaphore);
                    let runner = Arc::clone(&self.runner);
                    let scope = Arc::clone(&scope);
                    let codespace = codespace.to_string();
                    let options = self.config.options;

                    tokio::spawn(async move {
                        let _permit = semaphore.acquire().await.map_err(|_| {
                            ValidationError::Concurrency {
                                details: "validation semaphore closed".to_string(),
                            }
                        })?;
                        tokio::task::spawn_blocking(move || {
                            runner.validate_with_options(
                                &codespace,
                                scope.report_id(),
                                &file.name,
                                &file.content,
                                options,
                            )
                        })
                        .await
                        .map_err(|e| ValidationError::Concurrency {
                            details: format!("Task join error: {}", e),
                        })?
                    })
                })
                .collect();

            for outcome in join_all(tasks).await {
                let file_report = outcome.map_err(|e| ValidationError::Concurrency {
                    details: format!("Task join error: {}", e),
                })??;
                report.merge(file_report);
            }
        }

        let duration = start.elapsed();
        info!(
            report_id = %report_id,
            entries = report.len(),
            has_error = report.has_error(),
            elapsed_ms = duration.as_millis() as u64,
            "dataset validated"
        );
        drop(scope);

        Ok(DatasetResults {
            report,
            common_files: common_count,
            line_files: line_count,
            duration,
        })
    }

    async fn validate_one(
        &self,
        codespace: &str,
        scope: &Arc<ReportScope>,
        file: DatasetFile,
    ) -> Result<ValidationReport> {
        let runner = Arc::clone(&self.runner);
        let scope = Arc::clone(scope);
        let codespace = codespace.to_string();
        let options = self.config.options;
        tokio::task::spawn_blocking(move || {
            runner.validate_with_options(
                &codespace,
                scope.report_id(),
                &file.name,
                &file.content,
                options,
            )
        })
        .await
        .map_err(|e| ValidationError::Concurrency {
            details: format!("Task join error: {}", e),
        })?
    }
}

/// File name relative to the dataset root
fn display_name(root: &Path, file: &Path) -> String {
    let relative: PathBuf = match file.strip_prefix(root) {
        Ok(relative) if !relative.as_os_str().is_empty() => relative.to_path_buf(),
        _ => file
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| file.to_path_buf()),
    };
    relative.to_string_lossy().into_owned()
}
