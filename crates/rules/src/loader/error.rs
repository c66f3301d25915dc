//! Error types and load result structures for the alert loader.

use std::path::PathBuf;

/// Errors that can occur while loading alert definitions.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse/deserialization error, including unknown algorithm names.
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Definition parsed but failed validation, or duplicates another id.
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result alias for loader operations.
pub type Result<T> = std::result::Result<T, LoadError>;

/// Outcome of loading a single file.
#[derive(Debug)]
pub struct LoadResult {
    pub path: PathBuf,
    pub status: LoadStatus,
}

/// Status of a single file load attempt.
#[derive(Debug)]
pub enum LoadStatus {
    Loaded { alert_id: String },
    /// Dotfile or non-YAML file.
    Skipped { reason: String },
    Failed { error: String },
}
