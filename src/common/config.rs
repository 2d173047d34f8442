//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::paths::{config_path, DEFAULT_LOG_FILE};
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Shared log settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Extra capability marker tags, on top of the built-in vocabulary
    #[serde(default)]
    pub markers: MarkerConfig,

    /// Failure message classification
    #[serde(default)]
    pub failures: FailureConfig,
}

/// Shared log configuration
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// File that receives every collected test output, truncated per run
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
        }
    }
}

fn default_log_file() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_FILE)
}

/// Additional marker tags, grouped by the category they map to
#[derive(Debug, Deserialize, Default)]
pub struct MarkerConfig {
    #[serde(default)]
    pub test: Vec<String>,
    #[serde(default)]
    pub data_driven_test: Vec<String>,
    #[serde(default)]
    pub data_provider: Vec<String>,
    #[serde(default)]
    pub setup_once: Vec<String>,
    #[serde(default)]
    pub setup: Vec<String>,
}

/// Failure message classification settings
#[derive(Debug, Deserialize, Default)]
pub struct FailureConfig {
    /// Extra boilerplate suffixes stripped from assertion messages
    #[serde(default)]
    pub strip_suffixes: Vec<String>,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file, which must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| super::Error::file_read(path, e))?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}
