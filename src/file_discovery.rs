use crate::config::FileConfig;
use crate::error::{Result, ValidationError};
use ignore::WalkBuilder;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Finds manifest files below a set of directories
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    /// File extensions to include, without the leading dot
    extensions: Vec<String>,
    /// Paths matching any of these are left out
    ignored: Vec<Regex>,
    follow_symlinks: bool,
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl FileDiscovery {
    pub fn new() -> Self {
        Self {
            extensions: vec!["yaml".to_string(), "yml".to_string(), "json".to_string()],
            ignored: Vec::new(),
            follow_symlinks: false,
        }
    }

    pub fn from_config(config: &FileConfig) -> Result<Self> {
        Self::new()
            .with_extensions(config.extensions.clone())
            .with_ignored_patterns(&config.ignored_path_patterns)
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions.into_iter().map(|e| e.to_lowercase()).collect();
        self
    }

    /// Regular expressions matched against the full path of each candidate
    pub fn with_ignored_patterns(mut self, patterns: &[String]) -> Result<Self> {
        self.ignored = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    ValidationError::Config(format!("Invalid ignore pattern '{}': {}", pattern, e))
                })
            })
            .collect::<Result<_>>()?;
        Ok(self)
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Every matching file below `directories`, sorted and deduplicated
    pub async fn discover(&self, directories: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let discovery = self.clone();
        let directories = directories.to_vec();

        tokio::task::spawn_blocking(move || discovery.walk(&directories))
            .await
            .map_err(|e| ValidationError::Concurrency {
                details: format!("Directory walk failed: {}", e),
            })?
    }

    fn walk(&self, directories: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for directory in directories {
            if !directory.is_dir() {
                return Err(ValidationError::Config(format!(
                    "Not a directory: {}",
                    directory.display()
                )));
            }

            let walker = WalkBuilder::new(directory)
                .standard_filters(false)
                .follow_links(self.follow_symlinks)
                .build();

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(error = %e, "skipping unreadable path");
                        continue;
                    }
                };

                let is_file = entry.file_type().is_some_and(|t| t.is_file());
                if is_file && self.should_process(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        }

        files.sort();
        files.dedup();
        debug!(count = files.len(), "discovered manifest files");
        Ok(files)
    }

    /// Extension and ignore-pattern check for one path
    pub fn should_process(&self, path: &Path) -> bool {
        let extension_matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext.to_lowercase()));

        extension_matches && !self.is_ignored(path)
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        self.ignored.iter().any(|pattern| pattern.is_match(&path))
    }
}
