//! Error types for the test harness
//!
//! Only the variants of [`Error`] abort a run. Per-invocation problems
//! (resolution, configuration, test failures) have their own types in the
//! `testing` module and are reported and counted instead.

use std::io;
use std::path::Path;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error carried by test bodies and constructors
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Load Errors ===
    #[error("Artifact not found: {path}")]
    ArtifactNotFound { path: String },

    #[error("Dependent module '{module}' not found (looked for {path})")]
    ModuleNotFound { module: String, path: String },

    #[error("Artifact '{artifact}' names suite '{suite}', which is not registered. Known suites: {known}")]
    UnknownSuite {
        artifact: String,
        suite: String,
        known: String,
    },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Invalid name filter '{pattern}': {reason}")]
    InvalidFilter { pattern: String, reason: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create an artifact not found error
    pub fn artifact_not_found(path: &Path) -> Self {
        Self::ArtifactNotFound {
            path: path.display().to_string(),
        }
    }

    /// Create a module not found error
    pub fn module_not_found(module: &str, path: &Path) -> Self {
        Self::ModuleNotFound {
            module: module.to_string(),
            path: path.display().to_string(),
        }
    }

    /// Create a file read error
    pub fn file_read(path: &Path, error: impl std::fmt::Display) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Whether this error came from loading artifacts or modules
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Error::ArtifactNotFound { .. } | Error::ModuleNotFound { .. } | Error::UnknownSuite { .. }
        )
    }
}
