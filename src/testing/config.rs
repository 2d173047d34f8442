//! Target list and artifact manifest types
//!
//! A target list (JSON or YAML) names the artifacts to run. Each artifact
//! is a TOML manifest naming the registered suite it binds to, the modules
//! it requires and its key/value settings.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::common::paths::{parent_dir, resolve_relative};
use crate::common::{Error, Result};

/// One entry of the target list
#[derive(Deserialize, Debug, Clone)]
pub struct TestTarget {
    /// Path to the artifact manifest
    #[serde(alias = "Assembly")]
    pub artifact: PathBuf,
    /// Settings merged over the manifest's own
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl TestTarget {
    pub fn new(artifact: impl Into<PathBuf>) -> Self {
        Self {
            artifact: artifact.into(),
            settings: BTreeMap::new(),
        }
    }
}

/// Read a target list; relative artifact paths resolve against its directory
pub fn load_targets(path: &Path) -> Result<Vec<TestTarget>> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let mut targets: Vec<TestTarget> = if is_yaml {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };

    let base = parent_dir(path);
    for target in &mut targets {
        target.artifact = resolve_relative(base, &target.artifact);
    }
    Ok(targets)
}

/// Contents of an artifact or module manifest
#[derive(Deserialize, Debug, Default)]
pub struct ArtifactManifest {
    /// Registered suite name; defaults to the manifest's file stem
    pub suite: Option<String>,
    /// Modules resolved as `<manifest dir>/<name>.toml`
    #[serde(default)]
    pub requires: Vec<String>,
    /// Key/value settings; non-string values are kept in their TOML form
    #[serde(default)]
    settings: BTreeMap<String, toml::Value>,
}

impl ArtifactManifest {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    pub fn settings(&self) -> BTreeMap<String, String> {
        self.settings
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    toml::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), text)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest() {
        let manifest = ArtifactManifest::parse(
            r#"
suite = "calculator"
requires = ["shared"]

[settings]
base_url = "http://localhost:8080"
retries = 3
"#,
        )
        .unwrap();
        assert_eq!(manifest.suite.as_deref(), Some("calculator"));
        assert_eq!(manifest.requires, vec!["shared"]);
        let settings = manifest.settings();
        assert_eq!(settings["base_url"], "http://localhost:8080");
        assert_eq!(settings["retries"], "3");
    }

    #[test]
    fn test_load_json_targets_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("targets.json");
        std::fs::write(
            &list,
            r#"[{"artifact": "calc.toml", "settings": {"mode": "fast"}}, {"Assembly": "/abs/other.toml"}]"#,
        )
        .unwrap();
        let targets = load_targets(&list).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].artifact, dir.path().join("calc.toml"));
        assert_eq!(targets[0].settings["mode"], "fast");
        assert_eq!(targets[1].artifact, PathBuf::from("/abs/other.toml"));
    }

    #[test]
    fn test_load_yaml_targets() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("targets.yaml");
        std::fs::write(&list, "- artifact: suites/calc.toml\n").unwrap();
        let targets = load_targets(&list).unwrap();
        assert_eq!(targets[0].artifact, dir.path().join("suites/calc.toml"));
    }

    #[test]
    fn test_missing_target_list() {
        let err = load_targets(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }
}
