//! Input scanner for discovering synopsis spreadsheets.
//!
//! This module lists the spreadsheet files of the input directory,
//! respecting the configured extensions and recursion setting.

use crate::error::{AnalyzerError, Result};
use crate::models::InputFile;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Configuration for file scanning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// File extensions to include, without dot (e.g., ["xlsx"])
    pub extensions: Vec<String>,
    /// Descend into subdirectories
    pub recursive: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["xlsx".to_string()],
            recursive: false,
        }
    }
}

impl From<&crate::config::InputConfig> for ScanConfig {
    fn from(config: &crate::config::InputConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
            recursive: config.recursive,
        }
    }
}

/// Scanner over one input directory.
pub struct FileScanner {
    config: ScanConfig,
    root: PathBuf,
}

impl FileScanner {
    /// Create a new file scanner.
    pub fn new(root: PathBuf, config: ScanConfig) -> Self {
        Self { config, root }
    }

    /// Scan for all recognized files, sorted by path.
    ///
    /// Fails with [`AnalyzerError::NoInput`] if nothing is found.
    pub fn scan(&self) -> Result<Vec<InputFile>> {
        if !self.root.is_dir() {
            debug!("Input directory does not exist: {}", self.root.display());
            return Err(AnalyzerError::NoInput {
                dir: self.root.clone(),
            });
        }

        let max_depth = if self.config.recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();

        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                // hidden files reach `matches` and get logged, hidden directories are pruned
                e.depth() == 0 || !(e.file_type().is_dir() && is_hidden(e.file_name().to_str()))
            });

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!("Cannot read entry below {}: {}", self.root.display(), e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let name = self.relative_name(entry.path());
            if !self.matches(entry.path()) {
                info!("Skipping {} due to incompatible format", name);
                continue;
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            files.push(InputFile {
                path: entry.path().to_path_buf(),
                name,
                size,
            });
        }

        if files.is_empty() {
            return Err(AnalyzerError::NoInput {
                dir: self.root.clone(),
            });
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    /// Check if a file has a recognized extension and is neither hidden
    /// nor a lock file.
    pub fn matches(&self, path: &Path) -> bool {
        let name = path.file_name().and_then(|n| n.to_str());
        if is_hidden(name) || name.map(|n| n.starts_with("~$")).unwrap_or(true) {
            return false;
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        self.config
            .extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }

    /// Path below the input directory with `/` separators, so files of the
    /// same name in different subdirectories stay apart.
    fn relative_name(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Hidden files and directories (dot-prefixed).
fn is_hidden(name: Option<&str>) -> bool {
    name.map(|n| n.starts_with('.')).unwrap_or(false)
}
