//! Artifact loading
//!
//! Artifacts are not loaded as machine code. Each suite is compiled into the
//! harness and registered under a name in a [`SuiteRegistry`]; an artifact on
//! disk is a manifest binding to one of those suites. The loader checks that
//! the manifest exists, resolves the modules it requires relative to its
//! directory, and assembles the fixtures and constructor catalog.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use super::config::{ArtifactManifest, TestTarget};
use super::fixture::FixtureType;
use super::resolver::Catalog;
use crate::common::paths::parent_dir;
use crate::common::{Error, Result};

/// A suite's fixture types plus the shared services they depend on
#[derive(Default)]
pub struct Suite {
    fixtures: Vec<FixtureType>,
    services: Catalog,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fixture(mut self, fixture: FixtureType) -> Self {
        self.fixtures.push(fixture);
        self
    }

    /// Register constructors for non-fixture dependencies
    pub fn services(mut self, register: impl FnOnce(&mut Catalog)) -> Self {
        register(&mut self.services);
        self
    }
}

type SuiteFactory = Arc<dyn Fn() -> Suite + Send + Sync>;

/// Suites available to the loader, by name
#[derive(Clone, Default)]
pub struct SuiteRegistry {
    suites: HashMap<String, SuiteFactory>,
}

impl SuiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: &str,
        factory: impl Fn() -> Suite + Send + Sync + 'static,
    ) -> &mut Self {
        self.suites.insert(name.to_string(), Arc::new(factory));
        self
    }

    pub fn get(&self, name: &str) -> Option<Suite> {
        self.suites.get(name).map(|factory| factory())
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.suites.keys().cloned().collect();
        names.sort();
        names
    }
}

/// One loaded unit of test code
pub struct TestArtifact {
    name: String,
    path: PathBuf,
    fixtures: Vec<FixtureType>,
    catalog: Arc<Catalog>,
    settings: BTreeMap<String, String>,
}

impl TestArtifact {
    pub fn new(name: &str, path: impl Into<PathBuf>, suite: Suite) -> Self {
        let mut catalog = suite.services;
        for fixture in &suite.fixtures {
            catalog.merge(fixture.catalog());
        }
        Self {
            name: name.to_string(),
            path: path.into(),
            fixtures: suite.fixtures,
            catalog: Arc::new(catalog),
            settings: BTreeMap::new(),
        }
    }

    pub fn with_settings(mut self, settings: BTreeMap<String, String>) -> Self {
        self.settings = settings;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fixture types in declaration order
    pub fn fixtures(&self) -> &[FixtureType] {
        &self.fixtures
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        self.catalog.clone()
    }

    pub fn settings(&self) -> &BTreeMap<String, String> {
        &self.settings
    }
}

/// Loads the artifact a target names
#[async_trait]
pub trait ArtifactLoader: Send + Sync {
    async fn load(&self, target: &TestTarget) -> Result<TestArtifact>;
}

/// Loads TOML manifests bound to suites in a [`SuiteRegistry`]
pub struct ManifestLoader {
    suites: SuiteRegistry,
    /// Module manifests already read, by path
    modules: Mutex<HashMap<PathBuf, Arc<ArtifactManifest>>>,
}

impl ManifestLoader {
    pub fn new(suites: SuiteRegistry) -> Self {
        Self {
            suites,
            modules: Mutex::new(HashMap::new()),
        }
    }

    async fn read_manifest(path: &Path) -> Result<ArtifactManifest> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::file_read(path, e))?;
        ArtifactManifest::parse(&content)
    }

    fn suite_name(manifest: &ArtifactManifest, path: &Path) -> String {
        manifest.suite.clone().unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }

    /// Resolve the transitive `requires` of the manifest at `path`
    ///
    /// Returns the services contributed by every required module that binds
    /// to a registered suite.
    async fn resolve_modules(&self, path: &Path, requires: &[String]) -> Result<Catalog> {
        let mut services = Catalog::new();
        let mut pending: Vec<(PathBuf, String)> = requires
            .iter()
            .rev()
            .map(|module| (path.to_path_buf(), module.clone()))
            .collect();
        let mut seen = Vec::new();

        while let Some((requester, module)) = pending.pop() {
            let module_path = parent_dir(&requester).join(format!("{}.toml", module));
            if seen.contains(&module_path) {
                continue;
            }
            seen.push(module_path.clone());

            let cached = self
                .modules
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&module_path)
                .cloned();
            let manifest = match cached {
                Some(manifest) => manifest,
                None => {
                    if !tokio::fs::try_exists(&module_path).await.unwrap_or(false) {
                        tracing::error!(module = %module, requester = %requester.display(), "dependent module not found");
                        return Err(Error::module_not_found(&module, &module_path));
                    }
                    let manifest = Arc::new(Self::read_manifest(&module_path).await?);
                    tracing::debug!(module = %module, path = %module_path.display(), "loaded module");
                    self.modules
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(module_path.clone(), manifest.clone());
                    manifest
                }
            };

            if let Some(suite) = self.suites.get(&Self::suite_name(&manifest, &module_path)) {
                services.merge(&suite.services);
            }
            for nested in manifest.requires.iter().rev() {
                pending.push((module_path.clone(), nested.clone()));
            }
        }

        Ok(services)
    }
}

#[async_trait]
impl ArtifactLoader for ManifestLoader {
    async fn load(&self, target: &TestTarget) -> Result<TestArtifact> {
        let path = &target.artifact;
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            tracing::error!(artifact = %path.display(), "artifact not found");
            return Err(Error::artifact_not_found(path));
        }

        let manifest = Self::read_manifest(path).await?;
        let suite_name = Self::suite_name(&manifest, path);
        let module_services = self.resolve_modules(path, &manifest.requires).await?;

        let mut suite = self
            .suites
            .get(&suite_name)
            .ok_or_else(|| Error::UnknownSuite {
                artifact: path.display().to_string(),
                suite: suite_name.clone(),
                known: self.suites.names().join(", "),
            })?;
        suite.services.merge(&module_services);

        let mut settings = manifest.settings();
        settings.extend(target.settings.clone());

        tracing::debug!(
            artifact = %path.display(),
            suite = %suite_name,
            fixtures = suite.fixtures.len(),
            "loaded artifact"
        );
        Ok(TestArtifact::new(&suite_name, path.clone(), suite).with_settings(settings))
    }
}
