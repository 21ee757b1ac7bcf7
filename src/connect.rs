//! The pipeline context: registration, initialization, and building the
//! dispatcher.
//!
//! # Lifecycle
//!
//! ```text
//! register_*            any order, any number of times
//!      ↓
//! init_middlewares      exactly once
//!      ↓
//! init_guards           exactly once, after init_middlewares
//!      ↓
//! init_interceptors     at most once (optional)
//!      ↓
//! build                 binds controllers, composes chains → Dispatcher
//! ```
//!
//! Every step that fails returns a [`ConfigError`] and leaves the pipeline as
//! it was, so a misconfigured application stops before it serves anything.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::descriptor::ServiceDescriptor;
use crate::dispatch::{Dispatcher, RPC_PATH, Route, RouteTable};
use crate::error::ConfigError;
use crate::guard::Guard;
use crate::handler::Controller;
use crate::interceptor::{Interceptor, InterceptorConfig, ScopedInterceptor, bind_interceptors, compose, terminal};
use crate::mapper::discover_method_mappings;
use crate::middleware::{Middleware, MiddlewareConfig, MiddlewareHook, bind_middlewares};
use crate::registry::{ControllerRegistration, Registries, RegisterOptions, RouteMetadata, TypeKey};

/// Owns every registry and the initialization state of one pipeline.
///
/// ```rust,no_run
/// # use tsu_rpc::*;
/// # fn demo(rpc: &mut ConnectRpc) -> Result<(), ConfigError> { Ok(()) }
/// # fn main() -> Result<(), ConfigError> {
/// let mut rpc = ConnectRpc::new();
/// demo(&mut rpc)?;                 // register controllers, middlewares, guards…
/// rpc.init_middlewares([])?;
/// rpc.init_guards()?;
/// let dispatcher = rpc.build()?;
/// # Ok(()) }
/// ```
#[derive(Default)]
pub struct ConnectRpc {
    registries: Registries,
    strict: bool,
    middlewares: Option<Vec<MiddlewareHook>>,
    guards: Option<Vec<Arc<dyn Guard>>>,
    interceptors: Option<Vec<ScopedInterceptor>>,
}

impl ConnectRpc {
    pub fn new() -> Self {
        Self::default()
    }

    /// In strict mode, a config naming an unregistered middleware or
    /// interceptor, or a service method no controller implements, is a
    /// [`ConfigError`] instead of a warning.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn registries(&self) -> &Registries { &self.registries }

    /// Forgets every registration and initialization step.
    pub fn clear(&mut self) {
        self.registries.clear();
        self.middlewares = None;
        self.guards = None;
        self.interceptors = None;
    }

    // ── Registration ──────────────────────────────────────────────────────────

    /// Registers `controller` as the implementation of `service`.
    pub fn register_controller<C: Controller>(
        &mut self,
        controller: C,
        service: &'static ServiceDescriptor,
        options: RegisterOptions,
    ) -> Result<(), ConfigError> {
        let instance = Arc::new(controller);
        let methods = C::methods().bind(&instance);
        let registration = ControllerRegistration {
            instance: instance as Arc<dyn Any + Send + Sync>,
            service,
            methods,
        };
        self.registries.controllers.register(TypeKey::of::<C>(), Arc::new(registration), options)
    }

    pub fn register_middleware<M: Middleware>(&mut self, middleware: M, options: RegisterOptions) -> Result<(), ConfigError> {
        self.registries.middlewares.register(TypeKey::of::<M>(), Arc::new(middleware), options)
    }

    pub fn register_guard<G: Guard>(&mut self, guard: G, options: RegisterOptions) -> Result<(), ConfigError> {
        self.registries.guards.register(TypeKey::of::<G>(), Arc::new(guard), options)
    }

    pub fn register_interceptor<I: Interceptor>(&mut self, interceptor: I, options: RegisterOptions) -> Result<(), ConfigError> {
        self.registries.interceptors.register(TypeKey::of::<I>(), Arc::new(interceptor), options)
    }

    // ── Initialization ────────────────────────────────────────────────────────

    /// Resolves middleware configs into scoped hooks. Hooks for the same call
    /// run in the order of `configs`.
    pub fn init_middlewares(&mut self, configs: impl IntoIterator<Item = MiddlewareConfig>) -> Result<(), ConfigError> {
        if self.middlewares.is_some() {
            return Err(ConfigError::MiddlewaresAlreadyInitialized);
        }
        if self.guards.is_some() {
            return Err(ConfigError::GuardsBeforeMiddlewares);
        }
        let hooks = bind_middlewares(&self.registries.middlewares, configs.into_iter().collect(), self.strict)?;
        self.middlewares = Some(hooks);
        Ok(())
    }

    /// Freezes the registered guards, in registration order.
    pub fn init_guards(&mut self) -> Result<(), ConfigError> {
        if self.guards.is_some() {
            return Err(ConfigError::GuardsAlreadyInitialized);
        }
        if self.middlewares.is_none() {
            return Err(ConfigError::GuardsBeforeMiddlewares);
        }
        let guards: Vec<_> = self.registries.guards.all().iter().map(|r| Arc::clone(&r.instance)).collect();
        info!(count = guards.len(), "guards initialized");
        self.guards = Some(guards);
        Ok(())
    }

    /// Resolves interceptor configs. The first config ends up outermost.
    pub fn init_interceptors(&mut self, configs: impl IntoIterator<Item = InterceptorConfig>) -> Result<(), ConfigError> {
        if self.interceptors.is_some() {
            return Err(ConfigError::InterceptorsAlreadyInitialized);
        }
        let bound = bind_interceptors(&self.registries.interceptors, configs.into_iter().collect(), self.strict)?;
        self.interceptors = Some(bound);
        Ok(())
    }

    // ── Build ─────────────────────────────────────────────────────────────────

    /// Binds every registered controller to its service and returns the
    /// dispatcher.
    ///
    /// For each declared RPC method the mapper picks a controller method
    /// (see [`discover_method_mappings`]); unmapped methods are logged and
    /// answer `unimplemented` at call time. A mapped method whose streaming
    /// shape differs from the declaration, a path bound twice, or a name that
    /// is not a valid path segment, is an error.
    pub fn build(mut self) -> Result<Dispatcher, ConfigError> {
        let Some(middlewares) = self.middlewares.take() else {
            return Err(ConfigError::NotInitialized("middlewares"));
        };
        let Some(guards) = self.guards.take() else {
            return Err(ConfigError::NotInitialized("guards"));
        };
        let interceptors = self.interceptors.take().unwrap_or_default();

        let mut table = RouteTable {
            shape: matchit::Router::new(),
            routes: matchit::Router::new(),
            metadata: Vec::new(),
            services: HashMap::new(),
        };
        table.shape.insert(RPC_PATH, ())?;

        for reg in self.registries.controllers.all() {
            let controller = reg.key.name();
            let registration = &reg.instance;
            let service = registration.service;
            table.services.insert(service.type_name, service);

            let mappings = discover_method_mappings(&registration.method_names(), service);
            for method in &mappings.unbound {
                if self.strict {
                    return Err(ConfigError::UnboundMethod {
                        service: service.type_name,
                        method: method.name,
                        controller,
                    });
                }
                warn!(controller, service = service.type_name, method = method.name, "method not implemented");
            }

            for (method, handler_name) in mappings.bound {
                let Some(bound) = registration.method(handler_name) else { continue };
                if bound.handler.kind() != method.kind {
                    return Err(ConfigError::ShapeMismatch {
                        controller,
                        handler: handler_name,
                        service: service.type_name,
                        method: method.name,
                        declared: method.kind,
                        actual: bound.handler.kind(),
                    });
                }

                let metadata = self.registries.routes.register_route(RouteMetadata {
                    service_name: service.type_name,
                    method_name: method.name,
                    handler_class: reg.key,
                    handler_method: bound.handler.clone(),
                    handler_method_name: handler_name,
                    instance: Arc::clone(&registration.instance),
                    service,
                    method,
                })?;

                let call = compose(&interceptors, service.type_name, method, terminal(bound.handler.clone()));
                info!("binding {controller}.{handler_name} to {}.{}", service.type_name, method.name);
                table.routes.insert(metadata.path(), Route { metadata: Arc::clone(&metadata), call })?;
                table.metadata.push(metadata);
            }
        }

        if table.metadata.is_empty() {
            warn!("no controllers found to register");
        }
        info!(routes = table.metadata.len(), guards = guards.len(), "ready");

        Ok(Dispatcher::new(table, guards, middlewares))
    }
}
