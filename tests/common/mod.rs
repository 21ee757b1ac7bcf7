#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream, TryStreamExt};
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use serde::{Deserialize, Serialize};
use tsu_rpc::*;

pub static ELIZA: ServiceDescriptor = ServiceDescriptor::new(
    "connectrpc.eliza.v1.ElizaService",
    &[
        MethodDescriptor::new("Say", "say", MethodKind::Unary),
        MethodDescriptor::new("SayMany", "say_many", MethodKind::ClientStreaming),
        MethodDescriptor::new("ListenMany", "listen_many", MethodKind::ServerStreaming),
        MethodDescriptor::new("Converse", "converse", MethodKind::BidiStreaming),
        MethodDescriptor::new("Introduce", "introduce", MethodKind::ServerStreaming),
    ],
);

pub const SAY: &str = "/connectrpc.eliza.v1.ElizaService/Say";
pub const SAY_MANY: &str = "/connectrpc.eliza.v1.ElizaService/SayMany";
pub const LISTEN_MANY: &str = "/connectrpc.eliza.v1.ElizaService/ListenMany";
pub const CONVERSE: &str = "/connectrpc.eliza.v1.ElizaService/Converse";
pub const INTRODUCE: &str = "/connectrpc.eliza.v1.ElizaService/Introduce";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

// ── Controller ────────────────────────────────────────────────────────────────

/// Set by a middleware or interceptor, read by the handler.
#[derive(Clone)]
pub struct RequestId(pub String);

#[derive(Deserialize)]
pub struct SayRequest {
    #[serde(default)]
    pub sentence: String,
}

#[derive(Serialize)]
pub struct SayResponse {
    pub sentence: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl SayResponse {
    fn plain(sentence: String) -> Self {
        Self { sentence, request_id: None }
    }
}

/// Implements every `ElizaService` method except `Introduce`.
#[derive(Default)]
pub struct Eliza {
    pub calls: Arc<AtomicUsize>,
}

impl Eliza {
    pub fn counting(calls: &Arc<AtomicUsize>) -> Self {
        Self { calls: Arc::clone(calls) }
    }

    async fn say(self: Arc<Self>, req: SayRequest, ctx: CallContext) -> Result<SayResponse, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SayResponse {
            sentence: format!("You said: {}", req.sentence),
            request_id: ctx.value::<RequestId>().map(|id| id.0.clone()),
        })
    }

    async fn say_many(self: Arc<Self>, input: Streaming<SayRequest>, _: CallContext) -> Result<SayResponse, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let sentences: Vec<String> = input.map_ok(|r| r.sentence).try_collect().await?;
        Ok(SayResponse::plain(format!("You said: {}", sentences.join(", "))))
    }

    fn listen_many(self: Arc<Self>, req: SayRequest, _: CallContext) -> impl Stream<Item = Result<SayResponse, RpcError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let words: Vec<_> = req.sentence.split_whitespace().map(|w| Ok::<_, RpcError>(SayResponse::plain(w.to_owned()))).collect();
        stream::iter(words)
    }

    fn converse(
        self: Arc<Self>,
        input: Streaming<SayRequest>,
        _: CallContext,
    ) -> impl Stream<Item = Result<SayResponse, RpcError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        input.map_ok(|r| SayResponse::plain(format!("You said: {}", r.sentence)))
    }
}

impl Controller for Eliza {
    fn methods() -> Methods<Self> {
        Methods::new()
            .unary("say", Self::say)
            .client_streaming("say_many", Self::say_many)
            .server_streaming("listen_many", Self::listen_many)
            .bidi_streaming("converse", Self::converse)
    }
}

// ── Recording middlewares, interceptors and guards ────────────────────────────

pub type Trace = Arc<Mutex<Vec<u8>>>;

pub fn trace() -> Trace {
    Trace::default()
}

pub fn taken(trace: &Trace) -> Vec<u8> {
    std::mem::take(&mut *trace.lock().unwrap())
}

/// Middleware that records `N`. The const parameter makes each `Mark<N>` a
/// distinct registered type.
pub struct Mark<const N: u8>(pub Trace);

#[async_trait]
impl<const N: u8> Middleware for Mark<N> {
    async fn handle(&self, _req: &mut RequestHead, _res: &mut HeaderMap) -> Result<(), RpcError> {
        self.0.lock().unwrap().push(N);
        Ok(())
    }
}

/// Interceptor that records `N` on the way in.
pub struct Wrap<const N: u8>(pub Trace);

impl<const N: u8> Interceptor for Wrap<N> {
    fn wrap(self: Arc<Self>, next: Next) -> Next {
        next_fn(move |req| {
            let (this, next) = (Arc::clone(&self), Arc::clone(&next));
            async move {
                this.0.lock().unwrap().push(N);
                next(req).await
            }
        })
    }
}

/// Guard that counts how often it ran and answers `allow`.
pub struct Gate<const N: u8> {
    pub allow: bool,
    pub runs: Arc<AtomicUsize>,
}

impl<const N: u8> Gate<N> {
    pub fn new(allow: bool) -> (Self, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        (Self { allow, runs: Arc::clone(&runs) }, runs)
    }
}

#[async_trait]
impl<const N: u8> Guard for Gate<N> {
    async fn can_activate(&self, _ctx: &mut ExecutionContext<'_>) -> Result<bool, RpcError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(self.allow)
    }
}

// ── Pipeline and calls ────────────────────────────────────────────────────────

/// A pipeline with `Eliza` registered and no middlewares, guards or
/// interceptors.
pub fn eliza_dispatcher() -> Dispatcher {
    let mut rpc = ConnectRpc::new();
    rpc.register_controller(Eliza::default(), &ELIZA, RegisterOptions::default()).unwrap();
    rpc.init_middlewares([]).unwrap();
    rpc.init_guards().unwrap();
    rpc.build().unwrap()
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Reply {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }

    pub fn lines(&self) -> Vec<serde_json::Value> {
        self.body.lines().map(|l| serde_json::from_str(l).unwrap()).collect()
    }
}

pub async fn send(dispatcher: &Dispatcher, req: Request<Full<Bytes>>) -> Reply {
    let res = dispatcher.dispatch(req).await;
    let status = res.status();
    let headers = res.headers().clone();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    Reply { status, headers, body: String::from_utf8(bytes.to_vec()).unwrap() }
}

pub fn request(method: Method, path: &str, body: &str) -> Request<Full<Bytes>> {
    Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body.to_owned())))
        .unwrap()
}

pub async fn post(dispatcher: &Dispatcher, path: &str, body: &str) -> Reply {
    send(dispatcher, request(Method::POST, path, body)).await
}
