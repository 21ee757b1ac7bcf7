//! Type-keyed registries for controllers, middlewares, guards and
//! interceptors, plus the route-metadata store.
//!
//! A registry maps a concrete Rust type to the instance(s) the application
//! registered for it. By default a type may be registered once; a second
//! registration fails unless it opts in with
//! [`RegisterOptions::allow_multiple_instances`]. Registries are only written
//! during bootstrap, through `&mut` access on [`ConnectRpc`](crate::ConnectRpc).

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::descriptor::{MethodDescriptor, ServiceDescriptor};
use crate::error::ConfigError;
use crate::guard::Guard;
use crate::handler::{BoundMethod, MethodHandler};
use crate::interceptor::Interceptor;
use crate::middleware::Middleware;

// ── Keys and options ──────────────────────────────────────────────────────────

/// Identity of a registered type: its `TypeId` plus a name for log lines.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self { id: TypeId::of::<T>(), name: short_type_name(std::any::type_name::<T>()) }
    }

    pub fn id(&self) -> TypeId { self.id }
    pub fn name(&self) -> &'static str { self.name }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// `my_app::auth::TokenGuard` → `TokenGuard`. Generic arguments are kept.
fn short_type_name(full: &'static str) -> &'static str {
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(i) => &full[i + 2..],
        None => full,
    }
}

/// Options accepted by every `register_*` call.
#[derive(Clone, Copy, Debug, Default)]
pub struct RegisterOptions {
    pub allow_multiple_instances: bool,
}

impl RegisterOptions {
    /// Permits further instances of a type that is already registered.
    pub fn allow_multiple_instances() -> Self {
        Self { allow_multiple_instances: true }
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// One registered instance.
pub struct Registration<T: ?Sized> {
    pub key: TypeKey,
    pub instance: Arc<T>,
}

impl<T: ?Sized> Clone for Registration<T> {
    fn clone(&self) -> Self {
        Self { key: self.key, instance: Arc::clone(&self.instance) }
    }
}

/// An append-only, type-keyed set of instances, in registration order.
pub struct Registry<T: ?Sized> {
    kind: &'static str,
    entries: Vec<Registration<T>>,
}

impl<T: ?Sized> Registry<T> {
    pub fn new(kind: &'static str) -> Self {
        Self { kind, entries: Vec::new() }
    }

    /// Adds `instance` under `key`.
    ///
    /// Fails with [`ConfigError::DuplicateRegistration`] when `key` is already
    /// present and `options` does not allow multiple instances. A failed call
    /// leaves the registry unchanged.
    pub fn register(&mut self, key: TypeKey, instance: Arc<T>, options: RegisterOptions) -> Result<(), ConfigError> {
        if !options.allow_multiple_instances && self.contains(key.id()) {
            return Err(ConfigError::DuplicateRegistration { kind: self.kind, type_name: key.name() });
        }
        self.entries.push(Registration { key, instance });
        Ok(())
    }

    /// The first instance registered for `id`.
    pub fn get(&self, id: TypeId) -> Option<&Arc<T>> {
        self.entries.iter().find(|e| e.key.id() == id).map(|e| &e.instance)
    }

    /// Every instance registered for `id`, in registration order.
    pub fn get_all(&self, id: TypeId) -> impl Iterator<Item = &Registration<T>> {
        self.entries.iter().filter(move |e| e.key.id() == id)
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.entries.iter().any(|e| e.key.id() == id)
    }

    pub fn all(&self) -> &[Registration<T>] { &self.entries }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn kind(&self) -> &'static str { self.kind }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ── Controllers ───────────────────────────────────────────────────────────────

/// A controller instance together with the service it implements.
pub struct ControllerRegistration {
    pub instance: Arc<dyn Any + Send + Sync>,
    pub service: &'static ServiceDescriptor,
    pub(crate) methods: Vec<BoundMethod>,
}

impl ControllerRegistration {
    /// Names of the controller's methods, in declaration order.
    pub fn method_names(&self) -> Vec<&'static str> {
        self.methods.iter().map(|m| m.name).collect()
    }

    pub(crate) fn method(&self, name: &str) -> Option<&BoundMethod> {
        self.methods.iter().find(|m| m.name == name)
    }
}

// ── Route metadata ────────────────────────────────────────────────────────────

/// The binding from one wire path to a controller method and instance.
///
/// Created once per bound method when the pipeline is built; never mutated.
pub struct RouteMetadata {
    pub service_name: &'static str,
    pub method_name: &'static str,
    pub handler_class: TypeKey,
    pub handler_method: MethodHandler,
    pub handler_method_name: &'static str,
    pub instance: Arc<dyn Any + Send + Sync>,
    pub(crate) service: &'static ServiceDescriptor,
    pub(crate) method: &'static MethodDescriptor,
}

impl RouteMetadata {
    /// `/{service_name}/{method_name}`
    pub fn path(&self) -> String {
        format!("/{}/{}", self.service_name, self.method_name)
    }

    pub fn service(&self) -> &'static ServiceDescriptor { self.service }
    pub fn method(&self) -> &'static MethodDescriptor { self.method }
}

impl fmt::Debug for RouteMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMetadata")
            .field("path", &self.path())
            .field("handler_class", &self.handler_class.name())
            .field("handler_method_name", &self.handler_method_name)
            .field("kind", &self.handler_method.kind())
            .finish()
    }
}

/// Route metadata keyed by path. Sorted so listings are stable.
#[derive(Default)]
pub struct RouteStore {
    routes: BTreeMap<String, Arc<RouteMetadata>>,
}

impl RouteStore {
    /// Fails with [`ConfigError::DuplicateRoute`] when the path is taken.
    pub fn register_route(&mut self, metadata: RouteMetadata) -> Result<Arc<RouteMetadata>, ConfigError> {
        let path = metadata.path();
        if self.routes.contains_key(&path) {
            return Err(ConfigError::DuplicateRoute(path));
        }
        let metadata = Arc::new(metadata);
        self.routes.insert(path, Arc::clone(&metadata));
        Ok(metadata)
    }

    /// Exact lookup by URL path.
    pub fn get(&self, path: &str) -> Option<&Arc<RouteMetadata>> {
        self.routes.get(path)
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<RouteMetadata>> {
        self.routes.values()
    }

    pub fn len(&self) -> usize { self.routes.len() }
    pub fn is_empty(&self) -> bool { self.routes.is_empty() }

    pub fn clear(&mut self) {
        self.routes.clear();
    }
}

// ── Registries ────────────────────────────────────────────────────────────────

/// All registries of one pipeline.
pub struct Registries {
    pub controllers: Registry<ControllerRegistration>,
    pub middlewares: Registry<dyn Middleware>,
    pub guards: Registry<dyn Guard>,
    pub interceptors: Registry<dyn Interceptor>,
    pub routes: RouteStore,
}

impl Registries {
    pub fn new() -> Self {
        Self {
            controllers: Registry::new("controller"),
            middlewares: Registry::new("middleware"),
            guards: Registry::new("guard"),
            interceptors: Registry::new("interceptor"),
            routes: RouteStore::default(),
        }
    }

    /// Empties every registry in one step.
    pub fn clear(&mut self) {
        self.controllers.clear();
        self.middlewares.clear();
        self.guards.clear();
        self.interceptors.clear();
        self.routes.clear();
    }
}

impl Default for Registries {
    fn default() -> Self { Self::new() }
}
