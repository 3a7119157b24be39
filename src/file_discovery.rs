use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{Result, ValidationError};

type WalkFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Finds the files of a dataset directory.
///
/// Glob patterns are matched against paths relative to the dataset root, so
/// `_*.xml` selects the common files at the top level only.
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    /// Lower-case extensions without the dot
    extensions: Vec<String>,
    include_set: Option<GlobSet>,
    exclude_set: Option<GlobSet>,
    /// None = unlimited
    max_depth: Option<usize>,
    follow_symlinks: bool,
}

impl FileDiscovery {
    pub fn new() -> Self {
        Self {
            extensions: vec!["xml".to_string()],
            include_set: None,
            exclude_set: None,
            max_depth: None,
            follow_symlinks: false,
        }
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    pub fn with_include_patterns(mut self, patterns: Vec<String>) -> Result<Self> {
        self.include_set = glob_set(&patterns, "include")?;
        Ok(self)
    }

    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Result<Self> {
        self.exclude_set = glob_set(&patterns, "exclude")?;
        Ok(self)
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Files under `path` (or `path` itself when it is a file), sorted by path
    pub async fn discover_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let metadata = fs::metadata(path).await?;

        if metadata.is_file() {
            let name = path.file_name().map(Path::new).unwrap_or(path);
            return Ok(if self.should_process(name) {
                vec![path.to_path_buf()]
            } else {
                Vec::new()
            });
        }
        if !metadata.is_dir() {
            return Err(ValidationError::FileSystemTraversal {
                path: path.to_path_buf(),
                reason: "neither a file nor a directory".to_string(),
            });
        }

        let mut files = Vec::new();
        self.walk(path, path, 0, &mut files).await?;
        files.sort();
        debug!(root = %path.display(), files = files.len(), "discovered files");
        Ok(files)
    }

    fn walk<'a>(
        &'a self,
        root: &'a Path,
        dir: &'a Path,
        depth: usize,
        files: &'a mut Vec<PathBuf>,
    ) -> WalkFuture<'a> {
        Box::pin(async move {
            let mut read_dir = fs::read_dir(dir).await?;

            while let Some(entry) = read_dir.next_entry().await? {
                let entry_path = entry.path();
                if !self.follow_symlinks && entry.file_type().await?.is_symlink() {
                    continue;
                }

                let metadata = match fs::metadata(&entry_path).await {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        warn!(path = %entry_path.display(), error = %e, "skipping unreadable entry");
                        continue;
                    }
                };

                if metadata.is_file() {
                    let relative = entry_path.strip_prefix(root).unwrap_or(&entry_path);
                    if self.should_process(relative) {
                        files.push(entry_path);
                    }
                } else if metadata.is_dir() {
                    if self.max_depth.is_some_and(|max_depth| depth >= max_depth) {
                        continue;
                    }
                    if let Err(e) = self.walk(root, &entry_path, depth + 1, files).await {
                        warn!(path = %entry_path.display(), error = %e, "skipping directory");
                    }
                }
            }
            Ok(())
        })
    }

    /// Whether a path relative to the dataset root belongs to the dataset
    pub fn should_process(&self, relative: &Path) -> bool {
        let Some(extension) = relative.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        if !self.extensions.contains(&extension.to_lowercase()) {
            return false;
        }

        if let Some(exclude_set) = &self.exclude_set
            && exclude_set.is_match(relative)
        {
            return false;
        }

        match &self.include_set {
            Some(include_set) => include_set.is_match(relative),
            None => true,
        }
    }
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

fn glob_set(patterns: &[String], kind: &str) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| {
                ValidationError::Config(format!("Invalid glob pattern '{}': {}", pattern, e))
            })?;
        builder.add(glob);
    }

    builder
        .build()
        .map(Some)
        .map_err(|e| ValidationError::Config(format!("Failed to build {} glob set: {}", kind, e)))
}
