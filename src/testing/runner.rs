//! Test execution engine
//!
//! Drives discovery and execution one invocation at a time, in discovery
//! order. Every fixture type gets a fresh [`Resolver`]; every invocation gets
//! a fresh fixture instance and its own [`OutputCollector`], flushed to the
//! shared log once the invocation is reported.

use std::fmt;
use std::ops::AddAssign;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::AsyncWrite;

use super::config::TestTarget;
use super::discovery::{ConfigurationError, Discovery, Invocation, NameFilter};
use super::failure::{classify, split_crlf, RESPONSE_FOOTER, RESPONSE_HEADER};
use super::fixture::{CandidateMethod, FixtureType, MarkerRegistry, MethodCategory};
use super::loader::{ArtifactLoader, TestArtifact};
use super::output::{OutputCollector, TestOutput};
use super::reporter::Reporter;
use super::resolver::Resolver;
use super::settings::Settings;
use crate::common::config::Config;
use crate::common::{BoxError, Result};

/// Passed and failed invocation counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub passed: usize,
    pub failed: usize,
}

impl Tally {
    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    fn record(&mut self, passed: bool) {
        if passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
    }
}

impl AddAssign for Tally {
    fn add_assign(&mut self, other: Tally) {
        self.passed += other.passed;
        self.failed += other.failed;
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Passed: {} Failed: {}", self.passed, self.failed)
    }
}

/// Where an invocation is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pending,
    Constructing,
    SettingUp,
    Invoking,
    Passed,
    Failed,
    Reported,
}

/// A one-time setup that failed on an earlier invocation of the same type
#[derive(Error, Debug)]
#[error("One-time setup {method} of {fixture} failed on an earlier test")]
pub struct SetupOnceFailed {
    pub fixture: String,
    pub method: String,
}

/// One-time setup progress for the fixture type being run
#[derive(Debug, Clone, PartialEq, Eq)]
enum SetupOnce {
    Pending,
    Done,
    Failed(String),
}

/// What to run and how to classify failures
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub markers: MarkerRegistry,
    pub filter: NameFilter,
    /// Extra boilerplate stripped from assertion messages
    pub strip_suffixes: Vec<String>,
}

impl RunOptions {
    pub fn from_config(config: &Config, filter: NameFilter) -> Self {
        Self {
            markers: MarkerRegistry::with_config(&config.markers),
            filter,
            strip_suffixes: config.failures.strip_suffixes.clone(),
        }
    }
}

/// Runs test artifacts and tallies the results
pub struct Runner {
    options: RunOptions,
    reporter: Arc<dyn Reporter>,
    settings: Arc<Settings>,
}

impl Runner {
    pub fn new(options: RunOptions, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            options,
            reporter,
            settings: Arc::new(Settings::new()),
        }
    }

    /// Settings accumulated from the artifacts run so far
    pub fn settings(&self) -> Arc<Settings> {
        self.settings.clone()
    }

    /// Load and run every target in order
    ///
    /// Load failures abort the run; test failures of any kind are tallied.
    pub async fn run<W>(
        &self,
        targets: &[TestTarget],
        loader: &dyn ArtifactLoader,
        log: &mut W,
    ) -> Result<Tally>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let filters: Vec<String> = self.options.filter.patterns().map(String::from).collect();
        if !filters.is_empty() {
            self.reporter.on_filters(&filters);
        }

        let mut tally = Tally::default();
        for target in targets {
            let artifact = loader.load(target).await?;
            tally += self.run_artifact(&artifact, log).await?;
        }

        tracing::debug!(passed = tally.passed, failed = tally.failed, "run complete");
        self.reporter.on_run_complete(&tally);
        Ok(tally)
    }

    /// Run the public fixture types of one artifact
    pub async fn run_artifact<W>(&self, artifact: &TestArtifact, log: &mut W) -> Result<Tally>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let discovery = Discovery::new(&self.options.markers, &self.options.filter);
        let mut settings_loaded = false;
        let mut tally = Tally::default();

        for fixture in artifact.fixtures().iter().filter(|f| f.is_public()) {
            let methods = discovery.discover(fixture);
            if methods.is_empty() {
                continue;
            }

            if !settings_loaded {
                self.settings.merge(artifact.settings());
                settings_loaded = true;
                tracing::debug!(
                    artifact = artifact.name(),
                    count = artifact.settings().len(),
                    "merged artifact settings"
                );
            }

            tracing::debug!(fixture = fixture.name(), methods = methods.len(), "running fixture");
            self.reporter.on_fixture_start(fixture.short_name());

            let resolver = Resolver::new(artifact.catalog());
            let settings = self.settings.clone();
            resolver.replace_with::<Settings, _>(move || settings.clone());

            let mut setup_once = SetupOnce::Pending;
            for discovered in methods {
                match discovered.parameter_sets {
                    Ok(parameter_sets) => {
                        for parameters in parameter_sets {
                            let invocation = Invocation {
                                fixture,
                                method: discovered.method,
                                parameters,
                            };
                            let passed = self
                                .run_invocation(&invocation, &resolver, &mut setup_once, log)
                                .await?;
                            tally.record(passed);
                        }
                    }
                    Err(err) => {
                        self.report_configuration_error(fixture, discovered.method, &err, log)
                            .await?;
                        tally.record(false);
                    }
                }
            }

            self.reporter.on_fixture_end(fixture.short_name());
        }

        Ok(tally)
    }

    /// Run one invocation through its whole lifecycle; returns whether it passed
    async fn run_invocation<W>(
        &self,
        invocation: &Invocation<'_>,
        resolver: &Resolver,
        setup_once: &mut SetupOnce,
        log: &mut W,
    ) -> Result<bool>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let name = invocation.display_name();
        trace_phase(&name, Phase::Pending);
        self.reporter.on_invocation_start(&name);

        let collector = Arc::new(OutputCollector::new(
            invocation.fixture.name(),
            &invocation.method.name,
            &invocation.parameters.suffix,
        ));
        let output: Arc<dyn TestOutput> = collector.clone();
        resolver.replace_with::<dyn TestOutput, _>(move || output.clone());
        resolver.invalidate(invocation.fixture.key());

        let passed = match self.execute(invocation, resolver, setup_once) {
            Ok(()) => {
                trace_phase(&name, Phase::Passed);
                self.reporter.on_invocation_passed(&name);
                true
            }
            Err(err) => {
                trace_phase(&name, Phase::Failed);
                let classification = classify(err.as_ref(), &self.options.strip_suffixes);
                collector.write_line(&classification.detail);
                if let Some(content) = &classification.response_content {
                    collector.write_line(RESPONSE_HEADER);
                    for line in split_crlf(content) {
                        collector.write_line(line);
                    }
                    collector.write_line(RESPONSE_FOOTER);
                }
                tracing::debug!(invocation = %name, message = %classification.message, "invocation failed");
                self.reporter.on_invocation_failed(&name, &classification.message);
                false
            }
        };

        collector.write_line("");
        collector.write_line("");
        collector.collect(log).await?;
        trace_phase(&name, Phase::Reported);
        Ok(passed)
    }

    /// Construct, set up and invoke
    fn execute(
        &self,
        invocation: &Invocation<'_>,
        resolver: &Resolver,
        setup_once: &mut SetupOnce,
    ) -> std::result::Result<(), BoxError> {
        let name = invocation.display_name();
        let fixture_type = invocation.fixture;

        trace_phase(&name, Phase::Constructing);
        let fixture = resolver.get(fixture_type.key())?;

        trace_phase(&name, Phase::SettingUp);
        match setup_once {
            SetupOnce::Pending => {
                for setup in fixture_type.methods_in(&self.options.markers, MethodCategory::SetupOnce) {
                    if let Err(err) = setup.invoke(&fixture, &[]) {
                        *setup_once = SetupOnce::Failed(setup.name.clone());
                        return Err(Box::new(err));
                    }
                }
                *setup_once = SetupOnce::Done;
            }
            SetupOnce::Done => {}
            SetupOnce::Failed(method) => {
                return Err(Box::new(SetupOnceFailed {
                    fixture: fixture_type.name().to_string(),
                    method: method.clone(),
                }));
            }
        }
        for setup in fixture_type.methods_in(&self.options.markers, MethodCategory::SetupPerTest) {
            setup.invoke(&fixture, &[])?;
        }

        trace_phase(&name, Phase::Invoking);
        invocation
            .method
            .invoke(&fixture, &invocation.parameters.arguments)?;
        Ok(())
    }

    /// A method whose parameters could not be expanded counts as one failure
    async fn report_configuration_error<W>(
        &self,
        fixture: &FixtureType,
        method: &CandidateMethod,
        err: &ConfigurationError,
        log: &mut W,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        tracing::warn!(fixture = fixture.name(), method = %method.name, error = %err, "misconfigured test");
        self.reporter.on_invocation_start(&method.name);

        let collector = OutputCollector::new(fixture.name(), &method.name, "");
        collector.write_line(&format!("ConfigurationError: {}", err));
        collector.write_line("");
        collector.write_line("");
        collector.collect(log).await?;

        self.reporter.on_invocation_failed(&method.name, &err.to_string());
        Ok(())
    }
}

fn trace_phase(invocation: &str, phase: Phase) {
    tracing::trace!(invocation = %invocation, phase = ?phase, "phase");
}
