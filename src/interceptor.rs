//! Interceptors: call-wrapping functions composed around the handler.
//!
//! An interceptor turns a continuation into a new continuation. It can look
//! at the request, change its context values, skip `next` entirely, or
//! inspect and map the result:
//!
//! ```rust
//! use std::sync::Arc;
//! use tsu_rpc::{Interceptor, Next, next_fn};
//!
//! struct Logging;
//!
//! impl Interceptor for Logging {
//!     fn wrap(self: Arc<Self>, next: Next) -> Next {
//!         next_fn(move |req| {
//!             let next = Arc::clone(&next);
//!             async move {
//!                 tracing::info!(method = req.method().name, "calling");
//!                 next(req).await
//!             }
//!         })
//!     }
//! }
//! ```
//!
//! Each route gets its own chain, folded once when the dispatcher is built:
//!
//! ```text
//! configs  [A (all), B (ElizaService), C (ElizaService.say)]
//! /…/Say       A → B → C → handler
//! /…/SayMany   A → B → handler
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use http::{Extensions, HeaderMap};
use tracing::{info, warn};

use crate::code::RpcError;
use crate::context::CallContext;
use crate::descriptor::{MethodDescriptor, ServiceDescriptor};
use crate::error::ConfigError;
use crate::handler::{MethodHandler, Payload};
use crate::registry::{Registry, TypeKey};
use crate::scope::Scope;

/// A continuation: the rest of the chain, ending at the handler.
pub type Next = Arc<dyn Fn(RpcRequest) -> BoxFuture<'static, Result<Payload, RpcError>> + Send + Sync>;

/// Builds a [`Next`] from an async closure.
pub fn next_fn<F, Fut>(f: F) -> Next
where
    F: Fn(RpcRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Payload, RpcError>> + Send + 'static,
{
    Arc::new(move |req: RpcRequest| -> BoxFuture<'static, Result<Payload, RpcError>> { Box::pin(f(req)) })
}

/// A call-wrapping function.
pub trait Interceptor: Send + Sync + 'static {
    /// Wraps `next`. Called once per route at build time, never per call.
    fn wrap(self: Arc<Self>, next: Next) -> Next;
}

// ── RpcRequest ────────────────────────────────────────────────────────────────

/// The request as it moves through the interceptor chain.
#[derive(Debug)]
pub struct RpcRequest {
    context: CallContext,
    pub message: Payload,
}

impl RpcRequest {
    pub fn new(context: CallContext, message: Payload) -> Self {
        Self { context, message }
    }

    pub fn service(&self) -> &'static ServiceDescriptor { self.context.service() }
    pub fn method(&self) -> &'static MethodDescriptor { self.context.method() }
    pub fn headers(&self) -> &HeaderMap { self.context.headers() }
    pub fn header(&self, name: &str) -> Option<&str> { self.context.header(name) }
    pub fn values(&self) -> &Extensions { self.context.values() }
    pub fn values_mut(&mut self) -> &mut Extensions { self.context.values_mut() }
    pub fn context(&self) -> &CallContext { &self.context }

    pub fn into_parts(self) -> (CallContext, Payload) {
        (self.context, self.message)
    }
}

// ── Configuration and composition ─────────────────────────────────────────────

/// Declares which registered interceptor runs, and for which calls. Same
/// scoping rules as [`MiddlewareConfig`](crate::MiddlewareConfig).
#[derive(Clone, Debug)]
pub struct InterceptorConfig {
    pub(crate) target: TypeKey,
    pub(crate) scope: Scope,
}

impl InterceptorConfig {
    pub fn of<I: Interceptor>() -> Self {
        Self { target: TypeKey::of::<I>(), scope: Scope::default() }
    }

    pub fn on(mut self, service: &'static ServiceDescriptor) -> Self {
        self.scope = self.scope.on(service);
        self
    }

    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = self.scope.methods(methods);
        self
    }
}

/// An interceptor instance with the scope it was configured for.
pub(crate) struct ScopedInterceptor {
    instance: Arc<dyn Interceptor>,
    scope: Scope,
}

/// Resolves interceptor configs against the registry, keeping config order.
pub(crate) fn bind_interceptors(
    registry: &Registry<dyn Interceptor>,
    configs: Vec<InterceptorConfig>,
    strict: bool,
) -> Result<Vec<ScopedInterceptor>, ConfigError> {
    let mut bound = Vec::with_capacity(configs.len());

    for config in configs {
        let name = config.target.name();
        let before = bound.len();

        bound.extend(registry.get_all(config.target.id()).map(|reg| ScopedInterceptor {
            instance: Arc::clone(&reg.instance),
            scope: config.scope.clone(),
        }));

        if bound.len() == before {
            if strict {
                return Err(ConfigError::MissingInstance { kind: "interceptor", type_name: name });
            }
            warn!(interceptor = name, "interceptor not found in registry, did you forget to register it?");
            continue;
        }

        info!("applied interceptor: {name} {}", config.scope);
    }

    Ok(bound)
}

/// The innermost continuation: invoke the handler.
pub(crate) fn terminal(handler: MethodHandler) -> Next {
    next_fn(move |req: RpcRequest| {
        let handler = handler.clone();
        async move {
            let (ctx, message) = req.into_parts();
            handler.invoke(message, ctx).await
        }
    })
}

/// Folds the interceptors that apply to `service`/`method` around `inner`,
/// right to left, so the first config ends up outermost.
pub(crate) fn compose(
    interceptors: &[ScopedInterceptor],
    service: &str,
    method: &MethodDescriptor,
    inner: Next,
) -> Next {
    interceptors
        .iter()
        .rev()
        .filter(|i| i.scope.matches(service, method))
        .fold(inner, |next, i| Arc::clone(&i.instance).wrap(next))
}
