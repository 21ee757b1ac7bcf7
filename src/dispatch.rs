//! Per-call dispatch: the route table and the pipeline state machine.
//!
//! ```text
//! MATCH ROUTE ─▶ GUARD ─▶ MIDDLEWARE (scoped) ─▶ INTERCEPT (scoped) ─▶ INVOKE ─▶ RESPOND
//!      │            │            │                                     │
//!      │            └─ 403       └─ error code                         └─ error code
//!      ├─ not /{service}/{method}      → 404, pipeline bypassed
//!      └─ no route metadata            → 501 if declared, else 404
//! ```

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use hyper::body::Body as HttpBody;
use tracing::{debug, warn};

use crate::code::RpcError;
use crate::codec;
use crate::context::{CallContext, ExecutionContext, RequestHead};
use crate::descriptor::ServiceDescriptor;
use crate::guard::{Guard, execute_guards};
use crate::interceptor::{Next, RpcRequest};
use crate::middleware::{MiddlewareHook, run_hooks};
use crate::registry::RouteMetadata;
use crate::response::{Body, Response};

/// One bound RPC method and its composed call target.
pub(crate) struct Route {
    pub(crate) metadata: Arc<RouteMetadata>,
    pub(crate) call: Next,
}

/// Every RPC path has this shape; anything else bypasses the pipeline.
pub(crate) const RPC_PATH: &str = "/{service}/{method}";

/// Everything [`ConnectRpc::build`](crate::ConnectRpc::build) resolved.
pub(crate) struct RouteTable {
    /// Matches [`RPC_PATH`].
    pub(crate) shape: matchit::Router<()>,
    /// Exact paths of bound methods.
    pub(crate) routes: matchit::Router<Route>,
    pub(crate) metadata: Vec<Arc<RouteMetadata>>,
    pub(crate) services: HashMap<&'static str, &'static ServiceDescriptor>,
}

/// The transport-facing route table, built by
/// [`ConnectRpc::build`](crate::ConnectRpc::build).
///
/// Immutable once built; share it behind an `Arc` across connections.
pub struct Dispatcher {
    table: RouteTable,
    guards: Vec<Arc<dyn Guard>>,
    middlewares: Vec<MiddlewareHook>,
}

impl Dispatcher {
    pub(crate) fn new(table: RouteTable, guards: Vec<Arc<dyn Guard>>, middlewares: Vec<MiddlewareHook>) -> Self {
        Self { table, guards, middlewares }
    }

    /// Metadata of every bound route, sorted by path.
    pub fn routes(&self) -> Vec<&RouteMetadata> {
        let mut all: Vec<_> = self.table.metadata.iter().map(Arc::as_ref).collect();
        all.sort_by_key(|m| m.path());
        all
    }

    /// Runs one inbound HTTP request through the pipeline.
    ///
    /// Never fails: every fault becomes an HTTP response.
    pub async fn dispatch<B>(&self, req: http::Request<B>) -> http::Response<Body>
    where
        B: HttpBody<Data = Bytes>,
        B::Error: Display,
    {
        self.respond(req).await.into_inner()
    }

    async fn respond<B>(&self, req: http::Request<B>) -> Response
    where
        B: HttpBody<Data = Bytes>,
        B::Error: Display,
    {
        let (parts, body) = req.into_parts();
        let path = parts.uri.path();

        // MATCH ROUTE
        let Ok(matched) = self.table.shape.at(path) else {
            return Response::status(StatusCode::NOT_FOUND);
        };
        let Ok(found) = self.table.routes.at(path) else {
            warn!(path, "no route metadata found");
            let service = matched.params.get("service").unwrap_or_default();
            let method = matched.params.get("method").unwrap_or_default();
            return self.unbound(service, method);
        };
        let route = found.value;
        if parts.method != Method::POST {
            return Response::method_not_allowed();
        }

        let meta = &route.metadata;
        let mut head = RequestHead::new(parts.uri, parts.headers);
        let mut response_headers = HeaderMap::new();

        // GUARD
        if !self.guards.is_empty() {
            let mut ctx = ExecutionContext::new(&head, &mut response_headers, meta);
            let denied = match execute_guards(&self.guards, &mut ctx).await {
                Ok(true) => None,
                Ok(false) => Some(RpcError::permission_denied("Forbidden")),
                Err(e) => Some(RpcError::permission_denied(e.message())),
            };
            if let Some(err) = denied {
                return fault(meta, err).with_headers(response_headers);
            }
        }

        // MIDDLEWARE
        if let Err(e) = run_hooks(&self.middlewares, meta.service_name, meta.method(), &mut head, &mut response_headers).await {
            return fault(meta, e).with_headers(response_headers);
        }

        // INTERCEPT + INVOKE
        let message = match codec::decode_request(body, meta.method().kind).await {
            Ok(m) => m,
            Err(e) => return fault(meta, e).with_headers(response_headers),
        };
        let ctx = CallContext::new(meta.service(), meta.method(), head);
        let result = (route.call)(RpcRequest::new(ctx, message)).await;

        // RESPOND
        match result {
            Ok(payload) => Response::from_payload(payload).with_headers(response_headers),
            Err(e) => fault(meta, e).with_headers(response_headers),
        }
    }

    /// Two-segment path with no handler behind it.
    fn unbound(&self, service: &str, method: &str) -> Response {
        let declared = self.table.services.get(service).is_some_and(|s| s.method(method).is_some());
        if declared {
            Response::error(&RpcError::unimplemented(format!("{service}.{method} is not implemented")))
        } else {
            Response::status(StatusCode::NOT_FOUND)
        }
    }
}

fn fault(meta: &RouteMetadata, err: RpcError) -> Response {
    debug!(path = %meta.path(), code = %err.code(), error = %err.message(), "call failed");
    Response::error(&err)
}
