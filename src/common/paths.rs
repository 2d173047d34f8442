//! Configuration and output paths

use std::path::{Path, PathBuf};

/// Name used for the configuration directory
const APP_NAME: &str = "runtests";

/// Default name of the shared log, created in the working directory
pub const DEFAULT_LOG_FILE: &str = "testoutput.log";

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/runtests/`
/// - macOS: `~/Library/Application Support/runtests/`
/// - Windows: `%APPDATA%\runtests\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Resolve `path` against `base_dir` unless it is already absolute
pub fn resolve_relative(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        base_dir.join(path)
    } else {
        path.to_path_buf()
    }
}

/// Directory containing `file`, or `.` for bare file names
pub fn parent_dir(file: &Path) -> &Path {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
