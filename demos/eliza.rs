//! Minimal tsu-rpc example: an Eliza service with a guard, a scoped
//! middleware and a timing interceptor.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example eliza
//!
//! Try:
//!   curl -X POST http://localhost:3000/connectrpc.eliza.v1.ElizaService/Say \
//!        -d '{"sentence":"hello"}'
//!   curl -X POST http://localhost:3000/connectrpc.eliza.v1.ElizaService/Introduce \
//!        -d '{"name":"alice"}'
//!   printf '{"sentence":"hi"}\n{"sentence":"bye"}\n' | curl -X POST --data-binary @- \
//!        http://localhost:3000/connectrpc.eliza.v1.ElizaService/Converse
//!   curl -X POST -H 'x-blocked: 1' http://localhost:3000/connectrpc.eliza.v1.ElizaService/Say

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream::{self, Stream, TryStreamExt};
use http::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::info;
use tsu_rpc::*;

static ELIZA: ServiceDescriptor = ServiceDescriptor::new(
    "connectrpc.eliza.v1.ElizaService",
    &[
        MethodDescriptor::new("Say", "say", MethodKind::Unary),
        MethodDescriptor::new("Converse", "converse", MethodKind::BidiStreaming),
        MethodDescriptor::new("Introduce", "introduce", MethodKind::ServerStreaming),
    ],
);

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let mut rpc = ConnectRpc::new();
    rpc.register_controller(Eliza, &ELIZA, RegisterOptions::default())?;
    rpc.register_guard(Blocklist, RegisterOptions::default())?;
    rpc.register_middleware(ServerName, RegisterOptions::default())?;
    rpc.register_interceptor(Timing, RegisterOptions::default())?;

    rpc.init_middlewares([MiddlewareConfig::of::<ServerName>().on(&ELIZA)])?;
    rpc.init_guards()?;
    rpc.init_interceptors([InterceptorConfig::of::<Timing>()])?;

    Server::bind("0.0.0.0:3000")?.serve(rpc.build()?).await
}

// ── Service ───────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SayRequest {
    sentence: String,
}

#[derive(Serialize)]
struct SayResponse {
    sentence: String,
}

#[derive(Deserialize)]
struct IntroduceRequest {
    #[serde(default)]
    name: String,
}

struct Eliza;

impl Eliza {
    async fn say(self: Arc<Self>, req: SayRequest, _: CallContext) -> Result<SayResponse, RpcError> {
        Ok(reply(&req.sentence))
    }

    // Each message is answered as it arrives.
    fn converse(self: Arc<Self>, input: Streaming<SayRequest>, _: CallContext) -> impl Stream<Item = Result<SayResponse, RpcError>> {
        input.map_ok(|req| reply(&req.sentence))
    }

    fn introduce(self: Arc<Self>, req: IntroduceRequest, _: CallContext) -> impl Stream<Item = Result<SayResponse, RpcError>> {
        let name = if req.name.is_empty() { "stranger".to_owned() } else { req.name };
        let lines = [
            format!("Hi {name}. I'm Eliza."),
            "Before we begin, let me tell you something about myself.".to_owned(),
            "I was created in the 1960s.".to_owned(),
            "How are you feeling today?".to_owned(),
        ];
        stream::iter(lines.map(|sentence| Ok(SayResponse { sentence })))
    }
}

impl Controller for Eliza {
    fn methods() -> Methods<Self> {
        Methods::new()
            .unary("say", Self::say)
            .bidi_streaming("converse", Self::converse)
            .server_streaming("introduce", Self::introduce)
    }
}

fn reply(sentence: &str) -> SayResponse {
    let sentence = match sentence.trim() {
        "" => "Please, say something.".to_owned(),
        s if s.ends_with('?') => "Why do you ask?".to_owned(),
        s => format!("You said: {s}. How does that make you feel?"),
    };
    SayResponse { sentence }
}

// ── Pipeline pieces ───────────────────────────────────────────────────────────

/// Rejects any call carrying an `x-blocked` header.
struct Blocklist;

#[async_trait]
impl Guard for Blocklist {
    async fn can_activate(&self, ctx: &mut ExecutionContext<'_>) -> Result<bool, RpcError> {
        Ok(ctx.request().header("x-blocked").is_none())
    }
}

struct ServerName;

#[async_trait]
impl Middleware for ServerName {
    async fn handle(&self, _req: &mut RequestHead, res: &mut HeaderMap) -> Result<(), RpcError> {
        res.insert("x-served-by", HeaderValue::from_static("eliza"));
        Ok(())
    }
}

struct Timing;

impl Interceptor for Timing {
    fn wrap(self: Arc<Self>, next: Next) -> Next {
        next_fn(move |req| {
            let next = Arc::clone(&next);
            async move {
                let method = req.method().name;
                let start = Instant::now();
                let result = next(req).await;
                info!(method, elapsed = ?start.elapsed(), ok = result.is_ok(), "call finished");
                result
            }
        })
    }
}
