//! Error types for the analysis pipeline.
//!
//! Every variant terminates the run. Channel-level statistical failures
//! live in [`crate::stats::StatsError`] and never surface here.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the scan → parse → analyze → write pipeline.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// The input directory is missing, empty, or holds no recognized files.
    #[error("no spreadsheet files found in {}", dir.display())]
    NoInput { dir: PathBuf },

    /// A file could not be read as a synopsis (missing sheet or columns).
    #[error("malformed input {}: {reason}", path.display())]
    MalformedInput { path: PathBuf, reason: String },

    /// The output file could not be saved.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Analysis settings do not fit the data (application window out of range, etc).
    #[error("invalid analysis settings: {0}")]
    InvalidSettings(String),

    /// Reading interactive input failed.
    #[error("failed to read user input: {0}")]
    Prompt(#[from] std::io::Error),
}

impl AnalyzerError {
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        AnalyzerError::MalformedInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn write<E>(path: impl Into<PathBuf>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AnalyzerError::Write {
            path: path.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
