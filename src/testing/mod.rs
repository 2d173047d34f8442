//! Test execution engine
//!
//! Discovers test methods on registered fixture types, builds fixtures with
//! the dependency [`Resolver`], runs each invocation and collects its output
//! into the shared log.

pub mod config;
pub mod discovery;
pub mod failure;
pub mod fixture;
pub mod loader;
pub mod output;
pub mod reporter;
pub mod resolver;
pub mod runner;
pub mod settings;
pub mod value;

pub use config::{load_targets, ArtifactManifest, TestTarget};
pub use discovery::{ConfigurationError, Discovery, Invocation, NameFilter, ParameterSet};
pub use failure::{ensure_eq, AssertionError, ResponseError};
pub use fixture::{FixtureType, MarkerRegistry, Method, MethodCategory};
pub use loader::{ArtifactLoader, ManifestLoader, Suite, SuiteRegistry, TestArtifact};
pub use output::{OutputCollector, TestOutput};
pub use reporter::{ConsoleReporter, RecordingReporter, ReportEvent, Reporter};
pub use resolver::{Catalog, Param, ResolutionError, Resolver, TypeKey};
pub use runner::{RunOptions, Runner, Tally};
pub use settings::Settings;
pub use value::{Arguments, EnumType, ParamType, Value};
