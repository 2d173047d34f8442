//! Test discovery and parameter expansion
//!
//! Turns a fixture type into the ordered list of invocations to run:
//! runnable methods in declaration order, and for data-driven methods one
//! parameter set per data row, rows concatenated across providers in
//! declaration order. Literals are coerced to the formal parameter types and
//! missing trailing arguments are backfilled from declared defaults.

use regex::{Regex, RegexBuilder};
use thiserror::Error;

use super::fixture::{CandidateMethod, FixtureType, MarkerRegistry, MethodCategory};
use super::value::{coerce, CoercionError, Value};
use crate::common::{Error, Result};

/// A method whose data cannot be turned into a valid argument list
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Parameter {index} ({name}) of {method} not specified and has no default value")]
    MissingArgument {
        method: String,
        index: usize,
        name: String,
    },

    #[error("{method} takes {expected} parameter(s) but a data row supplies {given}")]
    TooManyArguments {
        method: String,
        expected: usize,
        given: usize,
    },

    #[error("Parameter {index} ({name}) of {method}: {source}")]
    Coercion {
        method: String,
        index: usize,
        name: String,
        #[source]
        source: CoercionError,
    },
}

/// Case-insensitive name patterns that must all match `"{Type}.{Method}"`
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    patterns: Vec<Regex>,
}

impl NameFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p.as_ref())
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| Error::InvalidFilter {
                        pattern: p.as_ref().to_string(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Regex::as_str)
    }

    pub fn matches(&self, qualified_name: &str) -> bool {
        self.patterns.iter().all(|p| p.is_match(qualified_name))
    }
}

/// Arguments for one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    /// Coerced literals followed by backfilled defaults
    pub arguments: Vec<Value>,
    /// How many of `arguments` came from the data row
    pub literal_count: usize,
    /// Rendering of the row's literals, `""` when there are none
    pub suffix: String,
}

impl ParameterSet {
    pub fn empty() -> Self {
        Self {
            arguments: Vec::new(),
            literal_count: 0,
            suffix: String::new(),
        }
    }
}

/// One concrete execution of a method with one parameter set
#[derive(Debug, Clone)]
pub struct Invocation<'f> {
    pub fixture: &'f FixtureType,
    pub method: &'f CandidateMethod,
    pub parameters: ParameterSet,
}

impl Invocation<'_> {
    /// `"{Method}{Suffix}"`, as shown on the console
    pub fn display_name(&self) -> String {
        format!("{}{}", self.method.name, self.parameters.suffix)
    }
}

/// A runnable method and the outcome of expanding its parameters
#[derive(Debug)]
pub struct DiscoveredMethod<'f> {
    pub method: &'f CandidateMethod,
    pub parameter_sets: std::result::Result<Vec<ParameterSet>, ConfigurationError>,
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Str(s) => format!("\"{}\"", s),
        other => other.to_string(),
    }
}

/// Render literal arguments as `" (1, \"abc\", null)"`
pub fn describe_arguments(values: &[Value]) -> String {
    if values.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = values.iter().map(describe).collect();
    format!(" ({})", parts.join(", "))
}

/// Finds runnable methods and expands their parameter sets
pub struct Discovery<'a> {
    markers: &'a MarkerRegistry,
    filter: &'a NameFilter,
}

impl<'a> Discovery<'a> {
    pub fn new(markers: &'a MarkerRegistry, filter: &'a NameFilter) -> Self {
        Self { markers, filter }
    }

    /// Runnable methods of `fixture` that pass the name filter, in declaration order
    pub fn runnable_methods<'f>(&self, fixture: &'f FixtureType) -> Vec<&'f CandidateMethod> {
        fixture
            .methods()
            .iter()
            .filter(|m| self.filter.matches(&format!("{}.{}", fixture.name(), m.name)))
            .filter(|m| m.is_runnable(self.markers))
            .collect()
    }

    /// Every runnable method with its expanded parameter sets
    pub fn discover<'f>(&self, fixture: &'f FixtureType) -> Vec<DiscoveredMethod<'f>> {
        self.runnable_methods(fixture)
            .into_iter()
            .map(|method| DiscoveredMethod {
                method,
                parameter_sets: self.expand(method),
            })
            .collect()
    }

    /// Flattened invocation list; fails on the first misconfigured method
    pub fn invocations<'f>(
        &self,
        fixture: &'f FixtureType,
    ) -> std::result::Result<Vec<Invocation<'f>>, ConfigurationError> {
        let mut invocations = Vec::new();
        for discovered in self.discover(fixture) {
            for parameters in discovered.parameter_sets? {
                invocations.push(Invocation {
                    fixture,
                    method: discovered.method,
                    parameters,
                });
            }
        }
        Ok(invocations)
    }

    /// Parameter sets of one method
    ///
    /// Plain tests without data-provider markers run once with no literals.
    /// A data-driven test with no providers has zero rows and so no
    /// parameter sets.
    pub fn expand(
        &self,
        method: &CandidateMethod,
    ) -> std::result::Result<Vec<ParameterSet>, ConfigurationError> {
        let providers: Vec<_> = method.data_markers(self.markers).collect();
        if providers.is_empty() {
            if method.has_category(self.markers, MethodCategory::DataDrivenTest) {
                return Ok(Vec::new());
            }
            return Ok(vec![complete(method, &[])?]);
        }

        providers
            .iter()
            .flat_map(|marker| marker.rows.iter())
            .map(|row| complete(method, row))
            .collect()
    }
}

/// Coerce a row's literals and backfill the remaining formals
fn complete(
    method: &CandidateMethod,
    row: &[Value],
) -> std::result::Result<ParameterSet, ConfigurationError> {
    if row.len() > method.params.len() {
        return Err(ConfigurationError::TooManyArguments {
            method: method.name.clone(),
            expected: method.params.len(),
            given: row.len(),
        });
    }

    let mut arguments = Vec::with_capacity(method.params.len());
    for (index, formal) in method.params.iter().enumerate() {
        let literal = match (row.get(index), &formal.default) {
            (Some(value), _) => value.clone(),
            (None, Some(default)) => default.clone(),
            (None, None) => {
                return Err(ConfigurationError::MissingArgument {
                    method: method.name.clone(),
                    index,
                    name: formal.name.clone(),
                })
            }
        };
        let value = coerce(literal, &formal.ty).map_err(|source| ConfigurationError::Coercion {
            method: method.name.clone(),
            index,
            name: formal.name.clone(),
            source,
        })?;
        arguments.push(value);
    }

    Ok(ParameterSet {
        arguments,
        literal_count: row.len(),
        suffix: describe_arguments(row),
    })
}
