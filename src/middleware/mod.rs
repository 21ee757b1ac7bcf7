//! Middleware layer.
//!
//! Middlewares are scoped pre-processing steps: they see the request head
//! and the response headers before the message is decoded, and can stash
//! context values for interceptors and handlers. Returning `Err` aborts the
//! call; neither later middlewares nor the handler run.
//!
//! ```rust
//! use async_trait::async_trait;
//! use http::HeaderMap;
//! use tsu_rpc::{Middleware, RequestHead, RpcError};
//!
//! #[derive(Clone)]
//! struct RequestId(String);
//!
//! struct Tagger;
//!
//! #[async_trait]
//! impl Middleware for Tagger {
//!     async fn handle(&self, req: &mut RequestHead, _res: &mut HeaderMap) -> Result<(), RpcError> {
//!         let id = req.header("x-request-id").unwrap_or("generated").to_owned();
//!         req.values_mut().insert(RequestId(id));
//!         Ok(())
//!     }
//! }
//! ```
//!
//! Scoping is declared separately, when the pipeline is initialized, with a
//! [`MiddlewareConfig`] per middleware. Hooks run in the order of that list.

mod binder;

use async_trait::async_trait;
use http::HeaderMap;

use crate::code::RpcError;
use crate::context::RequestHead;
use crate::descriptor::ServiceDescriptor;
use crate::registry::TypeKey;
use crate::scope::Scope;

pub(crate) use binder::{MiddlewareHook, bind_middlewares, run_hooks};

/// A pre-processing step.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, req: &mut RequestHead, res: &mut HeaderMap) -> Result<(), RpcError>;
}

/// Declares which registered middleware runs, and for which calls.
///
/// ```rust,ignore
/// MiddlewareConfig::of::<Tagger>()                         // every call
/// MiddlewareConfig::of::<Audit>().on(&ELIZA)               // one service
/// MiddlewareConfig::of::<Slow>().on(&ELIZA).methods(["say"])  // one method
/// ```
#[derive(Clone, Debug)]
pub struct MiddlewareConfig {
    pub(crate) target: TypeKey,
    pub(crate) scope: Scope,
}

impl MiddlewareConfig {
    pub fn of<M: Middleware>() -> Self {
        Self { target: TypeKey::of::<M>(), scope: Scope::default() }
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
