//! End-to-end tests for the test harness
//!
//! These tests write target lists and artifact manifests into a temporary
//! directory, run them through the CLI entry point with suites registered
//! here, and check the reported results and the shared log.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use runtests::cli;
use runtests::commands::Args;
use runtests::row;
use runtests::testing::{
    ensure_eq, FixtureType, ManifestLoader, Method, Param, ParamType, RecordingReporter,
    ReportEvent, Settings, Suite, SuiteRegistry, TestOutput,
};
use runtests::{Error, Result, Tally};
use tempfile::TempDir;

struct Adder;

struct AdderTests {
    output: Arc<dyn TestOutput>,
}

struct Sealed;

struct NeedsSealedTests;

struct HealthyTests;

struct FooTests;

struct ConfiguredTests {
    settings: Arc<Settings>,
}

struct Database;

struct RepositoryTests;

static FOO_CALLS: AtomicUsize = AtomicUsize::new(0);

fn suites() -> SuiteRegistry {
    let mut suites = SuiteRegistry::new();
    suites
        .register("passing", || {
            Suite::new().fixture(
                FixtureType::builder::<HealthyTests>("scenario.HealthyTests")
                    .constructor(vec![], |_| Ok(HealthyTests))
                    .test("Works", |_| Ok(()))
                    .build(),
            )
        })
        .register("adder", || {
            Suite::new()
                .services(|catalog| {
                    catalog.constructor::<Adder, _>(vec![], |_| Ok(Adder));
                })
                .fixture(
                    FixtureType::builder::<AdderTests>("scenario.AdderTests")
                        .constructor(
                            vec![Param::of::<Adder>(), Param::of::<dyn TestOutput>()],
                            |deps| Ok(AdderTests { output: deps.get(1)? }),
                        )
                        .method(
                            Method::new("Adds")
                                .marker("theory")
                                .data("data", vec![row![1, 2, 3], row![2, 2, 5]])
                                .param("a", ParamType::I32)
                                .param("b", ParamType::I32)
                                .param("expected", ParamType::I32),
                            |t, args| {
                                let a: i32 = args.get(0)?;
                                let b: i32 = args.get(1)?;
                                if a + b != args.get::<i32>(2)? {
                                    t.output.write_line("sum mismatch");
                                }
                                ensure_eq(a + b, args.get(2)?)?;
                                Ok(())
                            },
                        )
                        .build(),
                )
        })
        .register("unresolvable", || {
            Suite::new()
                .services(|catalog| {
                    catalog
                        .declare::<Sealed>("scenario.Sealed")
                        .private_constructor::<Sealed, _>(vec![], |_| Ok(Sealed));
                })
                .fixture(
                    FixtureType::builder::<NeedsSealedTests>("scenario.NeedsSealedTests")
                        .constructor(vec![Param::of::<Sealed>()], |_| Ok(NeedsSealedTests))
                        .test("Runs", |_| Ok(()))
                        .build(),
                )
                .fixture(
                    FixtureType::builder::<HealthyTests>("scenario.HealthyTests")
                        .constructor(vec![], |_| Ok(HealthyTests))
                        .test("Runs", |_| Ok(()))
                        .build(),
                )
        })
        .register("filtered", || {
            Suite::new().fixture(
                FixtureType::builder::<FooTests>("scenario.Foo")
                    .constructor(vec![], |_| Ok(FooTests))
                    .test("Bar", |_| {
                        FOO_CALLS.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .test("Baz", |_| {
                        FOO_CALLS.fetch_add(100, Ordering::SeqCst);
                        Ok(())
                    })
                    .build(),
            )
        })
        .register("configured", || {
            Suite::new().fixture(
                FixtureType::builder::<ConfiguredTests>("scenario.ConfiguredTests")
                    .constructor(vec![Param::of::<Settings>()], |deps| {
                        Ok(ConfiguredTests { settings: deps.get(0)? })
                    })
                    .test("ReadsSettings", |t| {
                        ensure_eq(t.settings.get("region").as_deref(), Some("us-east"))?;
                        ensure_eq(t.settings.get("retries").as_deref(), Some("3"))?;
                        Ok(())
                    })
                    .build(),
            )
        })
        .register("database", || {
            Suite::new().services(|catalog| {
                catalog.constructor::<Database, _>(vec![], |_| Ok(Database));
            })
        })
        .register("repository", || {
            Suite::new().fixture(
                FixtureType::builder::<RepositoryTests>("scenario.RepositoryTests")
                    .constructor(vec![Param::of::<Database>()], |_| Ok(RepositoryTests))
                    .test("Saves", |_| Ok(()))
                    .build(),
            )
        });
    suites
}

/// Temporary directory holding manifests, the target list and the log
struct TestContext {
    dir: TempDir,
}

struct RunOutcome {
    result: Result<Tally>,
    reporter: Arc<RecordingReporter>,
    log: String,
}

impl TestContext {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("config.toml"), "").expect("Failed to write config");
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `<name>.toml` with the given body
    fn manifest(&self, name: &str, body: &str) -> PathBuf {
        let path = self.path(&format!("{}.toml", name));
        std::fs::write(&path, body).expect("Failed to write manifest");
        path
    }

    /// Write a JSON target list naming the given manifests (relative paths)
    fn targets(&self, entries: &[serde_json::Value]) -> PathBuf {
        let path = self.path("targets.json");
        std::fs::write(&path, serde_json::to_string(entries).unwrap())
            .expect("Failed to write target list");
        path
    }

    fn args(&self, targets: &Path, filters: &[&str]) -> Args {
        Args {
            targets: Some(targets.to_path_buf()),
            filters: filters.iter().map(|f| f.to_string()).collect(),
            log_file: Some(self.path("testoutput.log")),
            config: Some(self.path("config.toml")),
            verbose: false,
        }
    }

    async fn run(&self, targets: &Path, filters: &[&str]) -> RunOutcome {
        let loader = ManifestLoader::new(suites());
        let reporter = Arc::new(RecordingReporter::new());
        let result = cli::run(self.args(targets, filters), &loader, reporter.clone()).await;
        let log = std::fs::read_to_string(self.path("testoutput.log")).unwrap_or_default();
        RunOutcome {
            result,
            reporter,
            log,
        }
    }
}

fn target(artifact: &str) -> serde_json::Value {
    serde_json::json!({ "artifact": artifact })
}

#[tokio::test]
async fn test_single_passing_test() {
    let ctx = TestContext::new();
    ctx.manifest("passing", "");
    let targets = ctx.targets(&[target("passing.toml")]);

    let outcome = ctx.run(&targets, &[]).await;
    let tally = outcome.result.unwrap();
    assert_eq!(tally.to_string(), "Passed: 1 Failed: 0");
    assert!(outcome.log.is_empty());
    assert_eq!(
        outcome.reporter.events().last(),
        Some(&ReportEvent::RunComplete(tally))
    );
}

#[tokio::test]
async fn test_data_rows_one_failing() {
    let ctx = TestContext::new();
    ctx.manifest("adder", "");
    let targets = ctx.targets(&[target("adder.toml")]);

    let outcome = ctx.run(&targets, &[]).await;
    assert_eq!(outcome.result.unwrap().to_string(), "Passed: 1 Failed: 1");
    assert_eq!(outcome.reporter.passed(), vec!["Adds (1, 2, 3)"]);
    assert_eq!(
        outcome.reporter.failed(),
        vec![("Adds (2, 2, 5)".to_string(), "expected 5 but was 4".to_string())]
    );

    assert_eq!(outcome.log.matches("scenario.AdderTests.Adds").count(), 1);
    assert!(outcome
        .log
        .starts_with("scenario.AdderTests.Adds (2, 2, 5):\n\n\nsum mismatch\nAssertionError: expected 5"));
}

#[tokio::test]
async fn test_unresolvable_dependency_fails_and_run_continues() {
    let ctx = TestContext::new();
    ctx.manifest("unresolvable", "");
    let targets = ctx.targets(&[target("unresolvable.toml")]);

    let outcome = ctx.run(&targets, &[]).await;
    let tally = outcome.result.unwrap();
    assert_eq!(tally, Tally { passed: 1, failed: 1 });
    assert_eq!(
        outcome.reporter.fixtures(),
        vec!["NeedsSealedTests", "HealthyTests"]
    );
    assert_eq!(
        outcome.reporter.failed()[0].1,
        "Could not construct scenario.Sealed as it does not have a public constructor"
    );
    assert!(outcome.log.contains("scenario.NeedsSealedTests.Runs:"));
    assert!(outcome
        .log
        .contains("---> ResolutionError: Could not construct scenario.Sealed"));
}

#[tokio::test]
async fn test_filter_selects_single_method() {
    let ctx = TestContext::new();
    ctx.manifest("filtered", "");
    let targets = ctx.targets(&[target("filtered.toml")]);

    let outcome = ctx.run(&targets, &["Foo.Bar"]).await;
    assert_eq!(outcome.result.unwrap(), Tally { passed: 1, failed: 0 });
    assert_eq!(outcome.reporter.passed(), vec!["Bar"]);
    assert_eq!(FOO_CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(
        outcome.reporter.events()[0],
        ReportEvent::Filters(vec!["Foo.Bar".to_string()])
    );
}

#[tokio::test]
async fn test_filter_matching_nothing_prints_no_header() {
    let ctx = TestContext::new();
    ctx.manifest("passing", "");
    let targets = ctx.targets(&[target("passing.toml")]);

    let outcome = ctx.run(&targets, &["nothing.matches.this"]).await;
    assert_eq!(outcome.result.unwrap().total(), 0);
    assert!(outcome.reporter.fixtures().is_empty());
}

#[tokio::test]
async fn test_settings_from_manifest_and_target() {
    let ctx = TestContext::new();
    ctx.manifest(
        "configured",
        "[settings]\nregion = \"eu-west\"\nretries = 3\n",
    );
    let targets = ctx.targets(&[serde_json::json!({
        "artifact": "configured.toml",
        "settings": { "region": "us-east" }
    })]);

    let outcome = ctx.run(&targets, &[]).await;
    assert!(outcome.reporter.failed().is_empty(), "{:?}", outcome.reporter.failed());
    assert_eq!(outcome.result.unwrap().passed, 1);
}

#[tokio::test]
async fn test_required_module_supplies_services() {
    let ctx = TestContext::new();
    ctx.manifest("repository", "requires = [\"database\"]\n");
    ctx.manifest("database", "");
    let targets = ctx.targets(&[target("repository.toml")]);

    let outcome = ctx.run(&targets, &[]).await;
    assert_eq!(outcome.result.unwrap(), Tally { passed: 1, failed: 0 });
}

#[tokio::test]
async fn test_missing_module_is_fatal() {
    let ctx = TestContext::new();
    ctx.manifest("repository", "requires = [\"database\"]\n");
    let targets = ctx.targets(&[target("repository.toml")]);

    let outcome = ctx.run(&targets, &[]).await;
    assert!(matches!(outcome.result, Err(Error::ModuleNotFound { .. })));
}

#[tokio::test]
async fn test_missing_artifact_is_fatal() {
    let ctx = TestContext::new();
    let targets = ctx.targets(&[target("absent.toml")]);

    let outcome = ctx.run(&targets, &[]).await;
    match outcome.result {
        Err(Error::ArtifactNotFound { path }) => assert!(path.ends_with("absent.toml")),
        other => panic!("unexpected result: {:?}", other.map(|t| t.to_string())),
    }
}

#[tokio::test]
async fn test_log_is_truncated_per_run() {
    let ctx = TestContext::new();
    ctx.manifest("passing", "");
    std::fs::write(ctx.path("testoutput.log"), "stale output from an earlier run").unwrap();
    let targets = ctx.targets(&[target("passing.toml")]);

    let outcome = ctx.run(&targets, &[]).await;
    assert!(outcome.result.is_ok());
    assert!(outcome.log.is_empty());
}

#[tokio::test]
async fn test_missing_target_list_argument() {
    let ctx = TestContext::new();
    let mut args = ctx.args(Path::new("unused.json"), &[]);
    args.targets = None;
    let loader = ManifestLoader::new(suites());
    let result = cli::run(args, &loader, Arc::new(RecordingReporter::new())).await;
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_binary_runs_selftest_suite() {
    let ctx = TestContext::new();
    ctx.manifest("selftest", "[settings]\ngreeting = \"Hi\"\n");
    let targets = ctx.targets(&[target("selftest.toml")]);

    let output = Command::new(env!("CARGO_BIN_EXE_runtests"))
        .arg(&targets)
        .arg("--log-file")
        .arg(ctx.path("testoutput.log"))
        .arg("--config")
        .arg(ctx.path("config.toml"))
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to run runtests");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout:\n{}", stdout);
    assert!(stdout.contains("CalculatorTests:"));
    assert!(stdout.contains("Passed: 8 Failed: 0"));

    let log = std::fs::read_to_string(ctx.path("testoutput.log")).unwrap();
    assert!(log.contains("greeting is \"Hi\""));
}

#[test]
fn test_binary_exit_code_on_fatal_error() {
    let ctx = TestContext::new();
    let targets = ctx.targets(&[target("missing.toml")]);

    let output = Command::new(env!("CARGO_BIN_EXE_runtests"))
        .arg(&targets)
        .arg("--log-file")
        .arg(ctx.path("testoutput.log"))
        .arg("--config")
        .arg(ctx.path("config.toml"))
        .output()
        .expect("Failed to run runtests");

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Artifact not found"));
}
