//! Fixture types, candidate methods and capability markers
//!
//! Fixtures are registered explicitly: a [`FixtureType`] lists its
//! constructors and its methods, each method bound to a closure and tagged
//! with marker strings. A [`MarkerRegistry`] maps those tags to what the
//! method is for (test, data provider, setup).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::failure::{catch_panic, InvocationError};
use super::resolver::{Catalog, Dependencies, Instance, Param, TypeKey};
use super::value::{Arguments, ParamType, Value};
use crate::common::config::MarkerConfig;
use crate::common::BoxError;

/// What a marker tag says about a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodCategory {
    /// Runnable test without data
    Test,
    /// Runnable test whose rows come from data-provider markers
    DataDrivenTest,
    /// Contributes rows to a data-driven test
    DataProvider,
    /// Both runnable and a row provider (one marker per case)
    DataDrivenCase,
    /// Runs once per fixture type, before its first invocation
    SetupOnce,
    /// Runs before every invocation
    SetupPerTest,
}

impl MethodCategory {
    pub fn is_runnable(self) -> bool {
        matches!(
            self,
            MethodCategory::Test | MethodCategory::DataDrivenTest | MethodCategory::DataDrivenCase
        )
    }

    pub fn provides_data(self) -> bool {
        matches!(self, MethodCategory::DataProvider | MethodCategory::DataDrivenCase)
    }
}

/// Maps marker tags to method categories
#[derive(Debug, Clone)]
pub struct MarkerRegistry {
    tags: HashMap<String, MethodCategory>,
}

impl Default for MarkerRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register("test", MethodCategory::Test)
            .register("theory", MethodCategory::DataDrivenTest)
            .register("case", MethodCategory::DataDrivenCase)
            .register("data", MethodCategory::DataProvider)
            .register("setup_once", MethodCategory::SetupOnce)
            .register("setup", MethodCategory::SetupPerTest);
        registry
    }
}

impl MarkerRegistry {
    /// A registry that knows no tags
    pub fn empty() -> Self {
        Self {
            tags: HashMap::new(),
        }
    }

    /// The built-in vocabulary extended with tags from the config file
    pub fn with_config(config: &MarkerConfig) -> Self {
        let mut registry = Self::default();
        let groups = [
            (&config.test, MethodCategory::Test),
            (&config.data_driven_test, MethodCategory::DataDrivenTest),
            (&config.data_provider, MethodCategory::DataProvider),
            (&config.setup_once, MethodCategory::SetupOnce),
            (&config.setup, MethodCategory::SetupPerTest),
        ];
        for (tags, category) in groups {
            for tag in tags {
                registry.register(tag, category);
            }
        }
        registry
    }

    pub fn register(&mut self, tag: &str, category: MethodCategory) -> &mut Self {
        self.tags.insert(tag.to_string(), category);
        self
    }

    pub fn category(&self, tag: &str) -> Option<MethodCategory> {
        self.tags.get(tag).copied()
    }
}

/// A capability marker attached to a method, with any data rows it carries
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub tag: String,
    pub rows: Vec<Vec<Value>>,
}

/// A declared formal parameter
#[derive(Debug, Clone, PartialEq)]
pub struct FormalParam {
    pub name: String,
    pub ty: ParamType,
    pub default: Option<Value>,
}

type Body = Arc<dyn Fn(&Instance, &Arguments<'_>) -> Result<(), InvocationError> + Send + Sync>;

/// Declaration of a method: name, parameters and markers
#[derive(Debug, Clone)]
pub struct Method {
    name: String,
    params: Vec<FormalParam>,
    markers: Vec<Marker>,
}

impl Method {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: Vec::new(),
            markers: Vec::new(),
        }
    }

    pub fn marker(mut self, tag: &str) -> Self {
        self.markers.push(Marker {
            tag: tag.to_string(),
            rows: Vec::new(),
        });
        self
    }

    /// A marker carrying data rows
    pub fn data(mut self, tag: &str, rows: impl IntoIterator<Item = Vec<Value>>) -> Self {
        self.markers.push(Marker {
            tag: tag.to_string(),
            rows: rows.into_iter().collect(),
        });
        self
    }

    pub fn param(mut self, name: &str, ty: ParamType) -> Self {
        self.params.push(FormalParam {
            name: name.to_string(),
            ty,
            default: None,
        });
        self
    }

    pub fn param_with_default(mut self, name: &str, ty: ParamType, default: impl Into<Value>) -> Self {
        self.params.push(FormalParam {
            name: name.to_string(),
            ty,
            default: Some(default.into()),
        });
        self
    }
}

/// A method of a fixture type, bound to its implementation
#[derive(Clone)]
pub struct CandidateMethod {
    pub name: String,
    pub params: Vec<FormalParam>,
    pub markers: Vec<Marker>,
    body: Body,
}

impl CandidateMethod {
    /// Categories of every marker the registry knows
    pub fn categories<'a>(
        &'a self,
        registry: &'a MarkerRegistry,
    ) -> impl Iterator<Item = MethodCategory> + 'a {
        self.markers.iter().filter_map(|m| registry.category(&m.tag))
    }

    pub fn has_category(&self, registry: &MarkerRegistry, category: MethodCategory) -> bool {
        self.categories(registry).any(|c| c == category)
    }

    pub fn is_runnable(&self, registry: &MarkerRegistry) -> bool {
        self.categories(registry).any(MethodCategory::is_runnable)
    }

    /// Markers that contribute data rows, in declaration order
    pub fn data_markers<'a>(&'a self, registry: &'a MarkerRegistry) -> impl Iterator<Item = &'a Marker> + 'a {
        self.markers.iter().filter(|m| {
            registry
                .category(&m.tag)
                .is_some_and(MethodCategory::provides_data)
        })
    }

    /// Call the method on `fixture`
    ///
    /// Errors and panics raised by the body come back wrapped in an
    /// [`InvocationError`].
    pub fn invoke(&self, fixture: &Instance, args: &[Value]) -> Result<(), InvocationError> {
        (self.body)(fixture, &Arguments::new(args))
    }
}

impl fmt::Debug for CandidateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CandidateMethod")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("markers", &self.markers)
            .finish()
    }
}

/// A registered test fixture type
pub struct FixtureType {
    name: String,
    key: TypeKey,
    public: bool,
    methods: Vec<CandidateMethod>,
    catalog: Catalog,
}

impl FixtureType {
    pub fn builder<F: Send + Sync + 'static>(name: &str) -> FixtureBuilder<F> {
        let mut catalog = Catalog::new();
        catalog.declare::<F>(name);
        FixtureBuilder {
            name: name.to_string(),
            public: true,
            methods: Vec::new(),
            catalog,
            _fixture: std::marker::PhantomData,
        }
    }

    /// Fully qualified name, e.g. `samples.CalculatorTests`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without its namespace, used for console headers
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn is_public(&self) -> bool {
        self.public
    }

    /// Methods in declaration order
    pub fn methods(&self) -> &[CandidateMethod] {
        &self.methods
    }

    /// Constructors of the fixture itself
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn methods_in<'a>(
        &'a self,
        registry: &'a MarkerRegistry,
        category: MethodCategory,
    ) -> impl Iterator<Item = &'a CandidateMethod> + 'a {
        self.methods
            .iter()
            .filter(move |m| m.has_category(registry, category))
    }
}

impl fmt::Debug for FixtureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureType")
            .field("name", &self.name)
            .field("public", &self.public)
            .field("methods", &self.methods)
            .finish()
    }
}

/// Builder for [`FixtureType`]
pub struct FixtureBuilder<F> {
    name: String,
    public: bool,
    methods: Vec<CandidateMethod>,
    catalog: Catalog,
    _fixture: std::marker::PhantomData<fn() -> F>,
}

impl<F: Send + Sync + 'static> FixtureBuilder<F> {
    /// Register a public constructor for the fixture
    pub fn constructor<B>(mut self, params: Vec<Param>, build: B) -> Self
    where
        B: Fn(&Dependencies) -> Result<F, BoxError> + Send + Sync + 'static,
    {
        self.catalog.constructor::<F, _>(params, build);
        self
    }

    /// Exclude the type from discovery
    pub fn internal(mut self) -> Self {
        self.public = false;
        self
    }

    /// Add a method with an explicit declaration
    pub fn method<B>(mut self, method: Method, run: B) -> Self
    where
        B: Fn(&F, &Arguments<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let name = method.name.clone();
        let fixture_type = self.name.clone();
        let body: Body = Arc::new(move |instance: &Instance, args: &Arguments<'_>| {
            let fixture = instance.downcast::<F>().ok_or_else(|| {
                InvocationError::new(&name, format!("fixture is not a {}", fixture_type).into())
            })?;
            match catch_panic(|| run(&fixture, args)) {
                Ok(Ok(())) => Ok(()),
                Ok(Err(source)) => Err(InvocationError::new(&name, source)),
                Err(panic) => Err(InvocationError::new(&name, Box::new(panic))),
            }
        });
        self.methods.push(CandidateMethod {
            name: method.name,
            params: method.params,
            markers: method.markers,
            body,
        });
        self
    }

    /// A parameterless test
    pub fn test<B>(self, name: &str, body: B) -> Self
    where
        B: Fn(&F) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.method(Method::new(name).marker("test"), move |fixture, _| body(fixture))
    }

    /// A setup method run before every test
    pub fn setup<B>(self, name: &str, body: B) -> Self
    where
        B: Fn(&F) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.method(Method::new(name).marker("setup"), move |fixture, _| body(fixture))
    }

    /// A setup method run once, before the type's first test
    pub fn setup_once<B>(self, name: &str, body: B) -> Self
    where
        B: Fn(&F) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.method(Method::new(name).marker("setup_once"), move |fixture, _| body(fixture))
    }

    pub fn build(self) -> FixtureType {
        FixtureType {
            name: self.name,
            key: TypeKey::of::<F>(),
            public: self.public,
            methods: self.methods,
            catalog: self.catalog,
        }
    }
}
