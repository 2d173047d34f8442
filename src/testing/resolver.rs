//! Dependency resolver
//!
//! Builds fixtures and their constructor dependencies from a [`Catalog`] of
//! registered constructors. Built instances are memoized per resolver, one
//! lazily initialized cell per type, so concurrent requests for the same
//! type construct it once. Override bindings (`replace`) short-circuit
//! construction and are never memoized; `invalidate` drops a memoized
//! instance so the next request builds a fresh one.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use once_cell::sync::OnceCell;
use thiserror::Error;

use super::failure;
use crate::common::BoxError;

/// Identity of a resolvable type
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Rust type name, used when the catalog has no display name
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

/// A type-erased shared instance
///
/// Always wraps an `Arc<T>`, which lets trait objects (`dyn TestOutput`) be
/// stored and handed out the same way as concrete fixtures.
#[derive(Clone)]
pub struct Instance(Arc<dyn Any + Send + Sync>);

impl Instance {
    pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.0.downcast_ref::<Arc<T>>().cloned()
    }

    /// Whether both handles refer to the same built instance
    pub fn same(&self, other: &Instance) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.0) as *const (),
            Arc::as_ptr(&other.0) as *const (),
        )
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

/// Zero-argument factory bound to a type
pub type Factory = Arc<dyn Fn() -> Instance + Send + Sync>;

type BuildFn = Arc<dyn Fn(&Dependencies) -> Result<Instance, BoxError> + Send + Sync>;

/// Errors raised while resolving a type
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("Could not construct {type_name} as it does not have a public constructor")]
    NoPublicConstructor { type_name: String },

    #[error("Could not construct {type_name}: dependency cycle {cycle}")]
    Cycle { type_name: String, cycle: String },

    #[error("Could not construct {type_name} (see inner error)")]
    ConstructionFailed {
        type_name: String,
        #[source]
        source: BoxError,
    },

    #[error("Could not construct {type_name}: a dependency could not be resolved")]
    Dependency {
        type_name: String,
        #[source]
        source: Box<ResolutionError>,
    },

    #[error("Constructor of {type_name} read argument {index} as {expected}, which does not match its parameter")]
    ArgumentMismatch {
        type_name: String,
        index: usize,
        expected: &'static str,
    },
}

impl ResolutionError {
    /// The type whose construction failed
    pub fn type_name(&self) -> &str {
        match self {
            ResolutionError::NoPublicConstructor { type_name }
            | ResolutionError::Cycle { type_name, .. }
            | ResolutionError::ConstructionFailed { type_name, .. }
            | ResolutionError::Dependency { type_name, .. }
            | ResolutionError::ArgumentMismatch { type_name, .. } => type_name,
        }
    }
}

/// A constructor parameter: the type it needs and an optional default
#[derive(Clone)]
pub struct Param {
    key: TypeKey,
    default: Option<Factory>,
}

impl Param {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            default: None,
        }
    }

    /// A parameter that falls back to `default` when nothing is bound for `T`
    pub fn with_default<T, F>(default: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        Self {
            key: TypeKey::of::<T>(),
            default: Some(Arc::new(move || Instance::new(default()))),
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Param")
            .field("key", &self.key)
            .field("has_default", &self.has_default())
            .finish()
    }
}

/// Resolved constructor arguments
pub struct Dependencies {
    type_name: String,
    values: Vec<Instance>,
}

impl Dependencies {
    /// Argument `index` as `T`
    pub fn get<T: ?Sized + Send + Sync + 'static>(
        &self,
        index: usize,
    ) -> Result<Arc<T>, ResolutionError> {
        self.values
            .get(index)
            .and_then(Instance::downcast::<T>)
            .ok_or_else(|| ResolutionError::ArgumentMismatch {
                type_name: self.type_name.clone(),
                index,
                expected: std::any::type_name::<T>(),
            })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Clone)]
struct Constructor {
    params: Vec<Param>,
    public: bool,
    build: BuildFn,
}

#[derive(Clone)]
struct TypeEntry {
    name: String,
    constructors: Vec<Constructor>,
}

/// Registered constructors, keyed by the type they build
#[derive(Clone, Default)]
pub struct Catalog {
    entries: HashMap<TypeKey, TypeEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a type and its display name without adding constructors
    pub fn declare<T: ?Sized + 'static>(&mut self, name: &str) -> &mut Self {
        self.entry(TypeKey::of::<T>()).name = name.to_string();
        self
    }

    /// Register a public constructor building `T`
    pub fn constructor<T, F>(&mut self, params: Vec<Param>, build: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Dependencies) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.shared_constructor::<T, _>(params, move |deps| build(deps).map(Arc::new))
    }

    /// Register a public constructor producing a shared `Arc<T>`, for trait objects
    pub fn shared_constructor<T, F>(&mut self, params: Vec<Param>, build: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Dependencies) -> Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        self.push::<T>(params, true, move |deps| build(deps).map(Instance::new));
        self
    }

    /// Register a constructor that exists but is not usable by the resolver
    pub fn private_constructor<T, F>(&mut self, params: Vec<Param>, build: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Dependencies) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.push::<T>(params, false, move |deps| {
            build(deps).map(|value| Instance::new(Arc::new(value)))
        });
        self
    }

    /// Absorb every entry of `other`; its constructors follow ours
    pub fn merge(&mut self, other: &Catalog) {
        for (key, entry) in &other.entries {
            match self.entries.get_mut(key) {
                Some(existing) => existing.constructors.extend(entry.constructors.iter().cloned()),
                None => {
                    self.entries.insert(*key, entry.clone());
                }
            }
        }
    }

    /// Display name of a type: the declared name, else the Rust type name
    pub fn type_name(&self, key: TypeKey) -> String {
        self.entries
            .get(&key)
            .map(|entry| entry.name.clone())
            .unwrap_or_else(|| key.name().to_string())
    }

    pub fn contains(&self, key: TypeKey) -> bool {
        self.entries.contains_key(&key)
    }

    fn push<T: ?Sized + 'static>(
        &mut self,
        params: Vec<Param>,
        public: bool,
        build: impl Fn(&Dependencies) -> Result<Instance, BoxError> + Send + Sync + 'static,
    ) {
        self.entry(TypeKey::of::<T>()).constructors.push(Constructor {
            params,
            public,
            build: Arc::new(build),
        });
    }

    fn entry(&mut self, key: TypeKey) -> &mut TypeEntry {
        self.entries.entry(key).or_insert_with(|| TypeEntry {
            name: key.name().to_string(),
            constructors: Vec::new(),
        })
    }
}

/// Lazily builds and memoizes instances from a catalog
pub struct Resolver {
    catalog: Arc<Catalog>,
    overrides: RwLock<HashMap<TypeKey, Factory>>,
    memo: Mutex<HashMap<TypeKey, Arc<OnceCell<Instance>>>>,
}

impl Resolver {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            overrides: RwLock::new(HashMap::new()),
            memo: Mutex::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Get an instance of `key`, building and memoizing it when needed
    pub fn get(&self, key: TypeKey) -> Result<Instance, ResolutionError> {
        self.resolve(key, &mut Vec::new())
    }

    /// Typed form of [`Resolver::get`]
    pub fn get_as<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolutionError> {
        let key = TypeKey::of::<T>();
        self.get(key)?
            .downcast::<T>()
            .ok_or_else(|| ResolutionError::ArgumentMismatch {
                type_name: self.catalog.type_name(key),
                index: 0,
                expected: std::any::type_name::<T>(),
            })
    }

    /// Bind `key` to `factory`, replacing any previous override
    pub fn replace(&self, key: TypeKey, factory: Factory) {
        self.overrides
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, factory);
    }

    /// Typed form of [`Resolver::replace`]
    pub fn replace_with<T, F>(&self, factory: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        self.replace(TypeKey::of::<T>(), Arc::new(move || Instance::new(factory())));
    }

    /// Drop the memoized instance of `key`, if any
    pub fn invalidate(&self, key: TypeKey) {
        self.memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
    }

    fn override_for(&self, key: TypeKey) -> Option<Factory> {
        self.overrides
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    fn memoized(&self, key: TypeKey) -> Option<Instance> {
        self.memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .and_then(|cell| cell.get().cloned())
    }

    fn resolve(&self, key: TypeKey, path: &mut Vec<TypeKey>) -> Result<Instance, ResolutionError> {
        if let Some(factory) = self.override_for(key) {
            return Ok(factory());
        }

        if path.contains(&key) {
            let cycle = path
                .iter()
                .chain(std::iter::once(&key))
                .map(|k| self.catalog.type_name(*k))
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(ResolutionError::Cycle {
                type_name: self.catalog.type_name(key),
                cycle,
            });
        }

        if let Some(instance) = self.memoized(key) {
            return Ok(instance);
        }

        // Dependencies are resolved before entering the cell so that a thread
        // building one side of a cycle never blocks on another thread's cell.
        path.push(key);
        let prepared = self.prepare(key, path);
        path.pop();
        let (constructor, deps) = prepared?;

        let cell = self
            .memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        cell.get_or_try_init(|| Self::build(constructor, deps)).cloned()
    }

    /// Pick the constructor for `key` and resolve its arguments
    fn prepare(
        &self,
        key: TypeKey,
        path: &mut Vec<TypeKey>,
    ) -> Result<(&Constructor, Dependencies), ResolutionError> {
        let type_name = self.catalog.type_name(key);
        let constructor = self
            .catalog
            .entries
            .get(&key)
            .and_then(|entry| {
                entry
                    .constructors
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| c.public)
                    .min_by_key(|(index, c)| (c.params.len(), *index))
                    .map(|(_, c)| c)
            })
            .ok_or_else(|| ResolutionError::NoPublicConstructor {
                type_name: type_name.clone(),
            })?;

        tracing::trace!(type_name = %type_name, arity = constructor.params.len(), "constructing");

        let mut values = Vec::with_capacity(constructor.params.len());
        for param in &constructor.params {
            let value = self
                .parameter_value(param, path)
                .map_err(|source| ResolutionError::Dependency {
                    type_name: type_name.clone(),
                    source: Box::new(source),
                })?;
            values.push(value);
        }

        Ok((constructor, Dependencies { type_name, values }))
    }

    fn build(constructor: &Constructor, deps: Dependencies) -> Result<Instance, ResolutionError> {
        match failure::catch_panic(|| (constructor.build)(&deps)) {
            Ok(Ok(instance)) => Ok(instance),
            Ok(Err(source)) => Err(ResolutionError::ConstructionFailed {
                type_name: deps.type_name,
                source,
            }),
            Err(panic) => Err(ResolutionError::ConstructionFailed {
                type_name: deps.type_name,
                source: Box::new(panic),
            }),
        }
    }

    /// Existing binding first, then the declared default, then a fresh build
    fn parameter_value(
        &self,
        param: &Param,
        path: &mut Vec<TypeKey>,
    ) -> Result<Instance, ResolutionError> {
        if let Some(factory) = self.override_for(param.key) {
            return Ok(factory());
        }
        if let Some(instance) = self.memoized(param.key) {
            return Ok(instance);
        }
        if let Some(default) = &param.default {
            return Ok(default());
        }
        self.resolve(param.key, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    struct Clock;

    struct Service {
        clock: Arc<Clock>,
    }

    struct Sealed;

    struct NeedsSealed {
        _sealed: Arc<Sealed>,
    }

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    fn base_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .constructor::<Clock, _>(vec![], |_| Ok(Clock))
            .constructor::<Service, _>(vec![Param::of::<Clock>()], |deps| {
                Ok(Service { clock: deps.get(0)? })
            });
        catalog
    }

    #[test]
    fn test_get_twice_returns_memoized_instance() {
        let resolver = Resolver::new(Arc::new(base_catalog()));
        let first = resolver.get(TypeKey::of::<Service>()).unwrap();
        let second = resolver.get(TypeKey::of::<Service>()).unwrap();
        assert!(first.same(&second));
    }

    #[test]
    fn test_invalidate_builds_fresh_instance() {
        let resolver = Resolver::new(Arc::new(base_catalog()));
        let first = resolver.get(TypeKey::of::<Service>()).unwrap();
        resolver.invalidate(TypeKey::of::<Service>());
        let second = resolver.get(TypeKey::of::<Service>()).unwrap();
        assert!(!first.same(&second));

        // The dependency stays memoized
        let a = first.downcast::<Service>().unwrap();
        let b = second.downcast::<Service>().unwrap();
        assert!(Arc::ptr_eq(&a.clock, &b.clock));
    }

    #[test]
    fn test_override_is_not_memoized() {
        let resolver = Resolver::new(Arc::new(Catalog::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        resolver.replace_with::<dyn Greeter, _>(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(English)
        });

        let greeter = resolver.get_as::<dyn Greeter>().unwrap();
        assert_eq!(greeter.greet(), "hello");
        resolver.get_as::<dyn Greeter>().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_override_replaces_previous_binding() {
        struct Marker(u32);
        let resolver = Resolver::new(Arc::new(Catalog::new()));
        resolver.replace_with::<Marker, _>(|| Arc::new(Marker(1)));
        resolver.replace_with::<Marker, _>(|| Arc::new(Marker(2)));
        assert_eq!(resolver.get_as::<Marker>().unwrap().0, 2);
    }

    #[test]
    fn test_fewest_parameters_wins_with_declaration_order_ties() {
        struct Picked(&'static str);
        let mut catalog = base_catalog();
        catalog
            .constructor::<Picked, _>(vec![Param::of::<Clock>()], |_| Ok(Picked("one-arg")))
            .constructor::<Picked, _>(vec![], |_| Ok(Picked("first-zero")))
            .constructor::<Picked, _>(vec![], |_| Ok(Picked("second-zero")));
        let resolver = Resolver::new(Arc::new(catalog));
        assert_eq!(resolver.get_as::<Picked>().unwrap().0, "first-zero");
    }

    #[test]
    fn test_private_constructors_are_ignored() {
        let mut catalog = Catalog::new();
        catalog
            .declare::<Sealed>("Sealed")
            .private_constructor::<Sealed, _>(vec![], |_| Ok(Sealed));
        let resolver = Resolver::new(Arc::new(catalog));
        let err = resolver.get(TypeKey::of::<Sealed>()).unwrap_err();
        assert!(matches!(err, ResolutionError::NoPublicConstructor { ref type_name } if type_name == "Sealed"));
    }

    #[test]
    fn test_dependency_without_public_constructor_fails() {
        let mut catalog = Catalog::new();
        catalog
            .declare::<Sealed>("Sealed")
            .constructor::<NeedsSealed, _>(vec![Param::of::<Sealed>()], |deps| {
                Ok(NeedsSealed { _sealed: deps.get(0)? })
            });
        let resolver = Resolver::new(Arc::new(catalog));
        match resolver.get(TypeKey::of::<NeedsSealed>()).unwrap_err() {
            ResolutionError::Dependency { source, .. } => {
                assert_eq!(source.type_name(), "Sealed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_default_used_when_type_is_unconstructible() {
        let mut catalog = Catalog::new();
        catalog.declare::<Sealed>("Sealed").constructor::<NeedsSealed, _>(
            vec![Param::with_default::<Sealed, _>(|| Arc::new(Sealed))],
            |deps| Ok(NeedsSealed { _sealed: deps.get(0)? }),
        );
        let resolver = Resolver::new(Arc::new(catalog));
        assert!(resolver.get(TypeKey::of::<NeedsSealed>()).is_ok());
    }

    #[test]
    fn test_override_preferred_over_default() {
        struct Port(u16);
        struct Server {
            port: Arc<Port>,
        }
        let mut catalog = Catalog::new();
        catalog.constructor::<Server, _>(
            vec![Param::with_default::<Port, _>(|| Arc::new(Port(80)))],
            |deps| Ok(Server { port: deps.get(0)? }),
        );
        let resolver = Resolver::new(Arc::new(catalog));
        resolver.replace_with::<Port, _>(|| Arc::new(Port(8080)));
        assert_eq!(resolver.get_as::<Server>().unwrap().port.0, 8080);
    }

    #[test]
    fn test_construction_error_is_wrapped() {
        let mut catalog = Catalog::new();
        catalog.constructor::<Clock, _>(vec![], |_| Err("clock is broken".into()));
        let resolver = Resolver::new(Arc::new(catalog));
        let err = resolver.get(TypeKey::of::<Clock>()).unwrap_err();
        assert!(matches!(err, ResolutionError::ConstructionFailed { .. }));
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "clock is broken");
    }

    #[test]
    fn test_constructor_panic_is_wrapped() {
        let mut catalog = Catalog::new();
        catalog.constructor::<Clock, _>(vec![], |_| panic!("no clock today"));
        let resolver = Resolver::new(Arc::new(catalog));
        let err = resolver.get(TypeKey::of::<Clock>()).unwrap_err();
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("no clock today"));
    }

    #[test]
    fn test_cycle_is_detected() {
        struct Ping;
        struct Pong;
        let mut catalog = Catalog::new();
        catalog
            .declare::<Ping>("Ping")
            .declare::<Pong>("Pong")
            .constructor::<Ping, _>(vec![Param::of::<Pong>()], |_| Ok(Ping))
            .constructor::<Pong, _>(vec![Param::of::<Ping>()], |_| Ok(Pong));
        let resolver = Resolver::new(Arc::new(catalog));
        let err = resolver.get(TypeKey::of::<Ping>()).unwrap_err();
        let mut innermost: &dyn std::error::Error = &err;
        while let Some(next) = innermost.source() {
            innermost = next;
        }
        assert_eq!(
            innermost.to_string(),
            "Could not construct Ping: dependency cycle Ping -> Pong -> Ping"
        );
    }

    #[test]
    fn test_concurrent_get_constructs_once() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let mut catalog = Catalog::new();
        catalog.constructor::<Clock, _>(vec![], move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            Ok(Clock)
        });
        let resolver = Resolver::new(Arc::new(catalog));
        let barrier = Barrier::new(8);

        let instances: Vec<Instance> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        resolver.get(TypeKey::of::<Clock>()).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(instances.windows(2).all(|pair| pair[0].same(&pair[1])));
    }

    #[test]
    fn test_concurrent_cycle_reports_error_on_both_threads() {
        struct Gate;
        struct Ping;
        struct Pong;
        let mut catalog = Catalog::new();
        catalog
            .declare::<Ping>("Ping")
            .declare::<Pong>("Pong")
            .constructor::<Ping, _>(vec![Param::of::<Gate>(), Param::of::<Pong>()], |_| Ok(Ping))
            .constructor::<Pong, _>(vec![Param::of::<Gate>(), Param::of::<Ping>()], |_| Ok(Pong));
        let resolver = Arc::new(Resolver::new(Arc::new(catalog)));

        // Both threads pass the gate together, so each is mid-build on its
        // own side of the cycle when it asks for the other
        let barrier = Arc::new(Barrier::new(2));
        resolver.replace_with::<Gate, _>(move || {
            barrier.wait();
            Arc::new(Gate)
        });

        let (tx, rx) = std::sync::mpsc::channel();
        for key in [TypeKey::of::<Ping>(), TypeKey::of::<Pong>()] {
            let resolver = resolver.clone();
            let tx = tx.clone();
            std::thread::spawn(move || {
                let _ = tx.send(resolver.get(key).map(|_| ()));
            });
        }

        for _ in 0..2 {
            let result = rx
                .recv_timeout(Duration::from_secs(5))
                .expect("resolution of a cycle should not hang");
            let err = result.unwrap_err();
            let mut innermost: &dyn std::error::Error = &err;
            while let Some(next) = innermost.source() {
                innermost = next;
            }
            assert!(innermost.to_string().contains("dependency cycle"));
        }
    }
}
