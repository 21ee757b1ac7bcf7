//! Per-call request state seen by guards, middlewares, interceptors and
//! handlers.

use std::any::TypeId;

use http::{Extensions, HeaderMap, Uri};
use serde_json::Value;

use crate::descriptor::{MethodDescriptor, MethodKind, ServiceDescriptor};
use crate::handler::MethodHandler;
use crate::registry::RouteMetadata;

// ── RequestHead ───────────────────────────────────────────────────────────────

/// The raw request handle: URI, headers and the call's context values.
///
/// Context values are a typed map. Middlewares write them (a request id, an
/// access token), interceptors read and replace them, handlers read them.
#[derive(Debug, Default)]
pub struct RequestHead {
    pub(crate) uri: Uri,
    pub(crate) headers: HeaderMap,
    pub(crate) values: Extensions,
}

impl RequestHead {
    pub fn new(uri: Uri, headers: HeaderMap) -> Self {
        Self { uri, headers, values: Extensions::new() }
    }

    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn values(&self) -> &Extensions { &self.values }
    pub fn values_mut(&mut self) -> &mut Extensions { &mut self.values }

    /// Header lookup; `None` when absent or not valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Shorthand for `values().get::<T>()`.
    pub fn value<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values.get::<T>()
    }
}

// ── ExecutionContext ──────────────────────────────────────────────────────────

/// What a guard gets to decide with.
///
/// Built fresh for every guarded call and dropped when the guard phase ends.
pub struct ExecutionContext<'a> {
    request: &'a RequestHead,
    response: &'a mut HeaderMap,
    args: Vec<Value>,
    route: &'a RouteMetadata,
}

impl<'a> ExecutionContext<'a> {
    pub(crate) fn new(request: &'a RequestHead, response: &'a mut HeaderMap, route: &'a RouteMetadata) -> Self {
        Self { request, response, args: Vec::new(), route }
    }

    pub fn request(&self) -> &RequestHead { self.request }

    /// Headers that will be added to the response, whatever its outcome.
    pub fn response_headers(&mut self) -> &mut HeaderMap { self.response }

    /// Call arguments. RPC calls carry none; the message is decoded later.
    pub fn args(&self) -> &[Value] { &self.args }

    pub fn arg(&self, index: usize) -> Option<&Value> { self.args.get(index) }

    /// Type name of the controller that will handle the call.
    pub fn class(&self) -> &'static str { self.route.handler_class.name() }

    pub fn class_id(&self) -> TypeId { self.route.handler_class.id() }

    /// The controller method that will handle the call.
    pub fn handler(&self) -> &MethodHandler { &self.route.handler_method }

    pub fn handler_name(&self) -> &'static str { self.route.handler_method_name }

    pub fn route(&self) -> &RouteMetadata { self.route }
}

// ── CallContext ───────────────────────────────────────────────────────────────

/// The call as seen by interceptors and handlers.
#[derive(Debug)]
pub struct CallContext {
    service: &'static ServiceDescriptor,
    method: &'static MethodDescriptor,
    head: RequestHead,
}

impl CallContext {
    pub fn new(service: &'static ServiceDescriptor, method: &'static MethodDescriptor, head: RequestHead) -> Self {
        Self { service, method, head }
    }

    pub fn service(&self) -> &'static ServiceDescriptor { self.service }
    pub fn method(&self) -> &'static MethodDescriptor { self.method }
    pub fn kind(&self) -> MethodKind { self.method.kind }
    pub fn head(&self) -> &RequestHead { &self.head }
    pub fn headers(&self) -> &HeaderMap { &self.head.headers }
    pub fn header(&self, name: &str) -> Option<&str> { self.head.header(name) }
    pub fn values(&self) -> &Extensions { &self.head.values }
    pub fn values_mut(&mut self) -> &mut Extensions { &mut self.head.values }

    pub fn value<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.head.value::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[derive(Clone, Debug, PartialEq)]
    struct RequestId(String);

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("abc"));
        let head = RequestHead::new(Uri::from_static("/a.B/C"), headers);
        assert_eq!(head.header("X-Request-Id"), Some("abc"));
        assert_eq!(head.path(), "/a.B/C");
    }

    #[test]
    fn values_round_trip_by_type() {
        let mut head = RequestHead::default();
        head.values_mut().insert(RequestId("r-1".into()));
        assert_eq!(head.value::<RequestId>(), Some(&RequestId("r-1".into())));
        assert!(head.value::<String>().is_none());
    }
}
