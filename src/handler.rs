//! Controllers, method tables and handler type erasure.
//!
//! # From a typed method to a route
//!
//! There is no reflection to discover a controller's methods, so every
//! controller publishes a method table. The dispatcher stores handlers of
//! many different types in one route table, so each typed method is erased
//! behind a [`MethodHandler`]:
//!
//! ```text
//! async fn say(self: Arc<Self>, req: SayRequest, ctx: CallContext)
//!     -> Result<SayResponse, RpcError>                ← user writes this
//!        ↓ Methods::new().unary("say", Self::say)
//! HandlerEntry { name: "say", bind }                  ← typed, unbound
//!        ↓ register_controller(instance, &SERVICE)
//! MethodHandler::Unary(Arc<dyn Fn(Message, CallContext) -> BoxFuture>)
//!        ↓ at request time
//! decode JSON → say(instance, req, ctx).await → encode JSON
//! ```
//!
//! Per request the cost is one `Arc` clone of the instance and one virtual
//! call, the same as a plain HTTP handler.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{self, BoxFuture};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::code::RpcError;
use crate::context::CallContext;
use crate::descriptor::MethodKind;

// ── Messages ──────────────────────────────────────────────────────────────────

/// A decoded message as it travels through the pipeline.
pub type Message = serde_json::Value;

/// A lazy, finite sequence of messages.
pub type MessageStream = BoxStream<'static, Result<Message, RpcError>>;

/// A typed input sequence handed to client- and bidi-streaming handlers.
pub type Streaming<T> = BoxStream<'static, Result<T, RpcError>>;

/// What flows into and out of the interceptor chain: one message or a
/// sequence of them, depending on the method's [`MethodKind`].
pub enum Payload {
    Single(Message),
    Stream(MessageStream),
}

impl Payload {
    /// The single message, if this is not a stream.
    pub fn as_single(&self) -> Option<&Message> {
        match self {
            Self::Single(m) => Some(m),
            Self::Stream(_) => None,
        }
    }

    pub fn into_single(self) -> Option<Message> {
        match self {
            Self::Single(m) => Some(m),
            Self::Stream(_) => None,
        }
    }

    /// Turns either shape into a stream; a single message becomes a
    /// one-element stream.
    pub fn into_stream(self) -> MessageStream {
        match self {
            Self::Single(m) => stream::once(future::ready(Ok(m))).boxed(),
            Self::Stream(s) => s,
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(m) => f.debug_tuple("Single").field(m).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

// ── Erased handlers ───────────────────────────────────────────────────────────

type UnaryFn =
    dyn Fn(Message, CallContext) -> BoxFuture<'static, Result<Message, RpcError>> + Send + Sync;
type ClientStreamingFn =
    dyn Fn(MessageStream, CallContext) -> BoxFuture<'static, Result<Message, RpcError>> + Send + Sync;
type ServerStreamingFn =
    dyn Fn(Message, CallContext) -> BoxFuture<'static, Result<MessageStream, RpcError>> + Send + Sync;
type BidiStreamingFn =
    dyn Fn(MessageStream, CallContext) -> BoxFuture<'static, Result<MessageStream, RpcError>> + Send + Sync;

/// A controller method bound to its instance, with its streaming shape.
///
/// Cloning is one `Arc` increment.
#[derive(Clone)]
pub enum MethodHandler {
    Unary(Arc<UnaryFn>),
    ClientStreaming(Arc<ClientStreamingFn>),
    ServerStreaming(Arc<ServerStreamingFn>),
    BidiStreaming(Arc<BidiStreamingFn>),
}

impl MethodHandler {
    pub fn kind(&self) -> MethodKind {
        match self {
            Self::Unary(_)           => MethodKind::Unary,
            Self::ClientStreaming(_) => MethodKind::ClientStreaming,
            Self::ServerStreaming(_) => MethodKind::ServerStreaming,
            Self::BidiStreaming(_)   => MethodKind::BidiStreaming,
        }
    }

    /// Runs the handler, adapting the payload to the handler's input shape.
    pub async fn invoke(&self, payload: Payload, ctx: CallContext) -> Result<Payload, RpcError> {
        match self {
            Self::Unary(f) => {
                let msg = single(payload).await?;
                f(msg, ctx).await.map(Payload::Single)
            }
            Self::ClientStreaming(f) => f(payload.into_stream(), ctx).await.map(Payload::Single),
            Self::ServerStreaming(f) => {
                let msg = single(payload).await?;
                f(msg, ctx).await.map(Payload::Stream)
            }
            Self::BidiStreaming(f) => f(payload.into_stream(), ctx).await.map(Payload::Stream),
        }
    }
}

impl fmt::Debug for MethodHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodHandler({})", self.kind())
    }
}

/// Pulls exactly one message out of a payload. An interceptor may have
/// replaced a single message with a stream; the first element is used.
async fn single(payload: Payload) -> Result<Message, RpcError> {
    match payload {
        Payload::Single(m) => Ok(m),
        Payload::Stream(mut s) => match s.next().await {
            Some(item) => item,
            None => Err(RpcError::invalid_argument("expected one message, got an empty stream")),
        },
    }
}

fn decode<T: DeserializeOwned>(msg: Message) -> Result<T, RpcError> {
    serde_json::from_value(msg).map_err(|e| RpcError::invalid_argument(format!("decode: {e}")))
}

fn encode<T: Serialize>(value: &T) -> Result<Message, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::internal(format!("encode: {e}")))
}

fn decode_stream<T: DeserializeOwned + Send + 'static>(input: MessageStream) -> Streaming<T> {
    input.map(|item| item.and_then(decode)).boxed()
}

fn encode_stream<S, T>(output: S) -> MessageStream
where
    S: Stream<Item = Result<T, RpcError>> + Send + 'static,
    T: Serialize + Send + 'static,
{
    output.map(|item| item.and_then(|v| encode(&v))).boxed()
}

// ── Controllers ───────────────────────────────────────────────────────────────

/// A type whose methods implement an RPC service.
///
/// ```rust
/// use std::sync::Arc;
/// use serde::{Deserialize, Serialize};
/// use tsu_rpc::{CallContext, Controller, Methods, RpcError};
///
/// #[derive(Deserialize)]
/// struct SayRequest { sentence: String }
/// #[derive(Serialize)]
/// struct SayResponse { sentence: String }
///
/// struct Eliza;
///
/// impl Eliza {
///     async fn say(self: Arc<Self>, req: SayRequest, _: CallContext) -> Result<SayResponse, RpcError> {
///         Ok(SayResponse { sentence: format!("You said: {}", req.sentence) })
///     }
/// }
///
/// impl Controller for Eliza {
///     fn methods() -> Methods<Self> {
///         Methods::new().unary("say", Self::say)
///     }
/// }
/// ```
pub trait Controller: Send + Sync + Sized + 'static {
    /// The controller's method table. Names are matched against each RPC
    /// method's local name first, then case-insensitively against its wire
    /// name.
    fn methods() -> Methods<Self>;
}

type BindFn<C> = Box<dyn Fn(Arc<C>) -> MethodHandler + Send + Sync>;

struct HandlerEntry<C> {
    name: &'static str,
    bind: BindFn<C>,
}

/// A controller's named, typed methods, not yet bound to an instance.
pub struct Methods<C> {
    entries: Vec<HandlerEntry<C>>,
}

impl<C: Send + Sync + 'static> Methods<C> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// One request, one response.
    pub fn unary<Req, Res, F, Fut>(self, name: &'static str, f: F) -> Self
    where
        F: Fn(Arc<C>, Req, CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, RpcError>> + Send + 'static,
        Req: DeserializeOwned + Send + 'static,
        Res: Serialize + Send + 'static,
    {
        let f = Arc::new(f);
        self.add(name, move |this| {
            let f = Arc::clone(&f);
            MethodHandler::Unary(Arc::new(move |msg: Message, ctx: CallContext| -> BoxFuture<'static, Result<Message, RpcError>> {
                let (f, this) = (Arc::clone(&f), Arc::clone(&this));
                Box::pin(async move {
                    let res = f(this, decode(msg)?, ctx).await?;
                    encode(&res)
                })
            }))
        })
    }

    /// Many requests, one aggregate response.
    pub fn client_streaming<Req, Res, F, Fut>(self, name: &'static str, f: F) -> Self
    where
        F: Fn(Arc<C>, Streaming<Req>, CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, RpcError>> + Send + 'static,
        Req: DeserializeOwned + Send + 'static,
        Res: Serialize + Send + 'static,
    {
        let f = Arc::new(f);
        self.add(name, move |this| {
            let f = Arc::clone(&f);
            MethodHandler::ClientStreaming(Arc::new(move |input: MessageStream, ctx: CallContext| -> BoxFuture<'static, Result<Message, RpcError>> {
                let (f, this) = (Arc::clone(&f), Arc::clone(&this));
                Box::pin(async move {
                    let res = f(this, decode_stream(input), ctx).await?;
                    encode(&res)
                })
            }))
        })
    }

    /// One request, a lazy sequence of responses.
    pub fn server_streaming<Req, Res, F, S>(self, name: &'static str, f: F) -> Self
    where
        F: Fn(Arc<C>, Req, CallContext) -> S + Send + Sync + 'static,
        S: Stream<Item = Result<Res, RpcError>> + Send + 'static,
        Req: DeserializeOwned + Send + 'static,
        Res: Serialize + Send + 'static,
    {
        let f = Arc::new(f);
        self.add(name, move |this| {
            let f = Arc::clone(&f);
            MethodHandler::ServerStreaming(Arc::new(move |msg: Message, ctx: CallContext| -> BoxFuture<'static, Result<MessageStream, RpcError>> {
                let output = decode(msg).map(|req| encode_stream(f(Arc::clone(&this), req, ctx)));
                Box::pin(future::ready(output))
            }))
        })
    }

    /// A sequence in, a sequence out.
    ///
    /// The request body is read to its end before the handler runs, so the
    /// first response is written only after the client has sent its last
    /// message. Half-duplex, not interleaved.
    pub fn bidi_streaming<Req, Res, F, S>(self, name: &'static str, f: F) -> Self
    where
        F: Fn(Arc<C>, Streaming<Req>, CallContext) -> S + Send + Sync + 'static,
        S: Stream<Item = Result<Res, RpcError>> + Send + 'static,
        Req: DeserializeOwned + Send + 'static,
        Res: Serialize + Send + 'static,
    {
        let f = Arc::new(f);
        self.add(name, move |this| {
            let f = Arc::clone(&f);
            MethodHandler::BidiStreaming(Arc::new(move |input: MessageStream, ctx: CallContext| -> BoxFuture<'static, Result<MessageStream, RpcError>> {
                let output = encode_stream(f(Arc::clone(&this), decode_stream(input), ctx));
                Box::pin(future::ready(Ok(output)))
            }))
        })
    }

    fn add(mut self, name: &'static str, bind: impl Fn(Arc<C>) -> MethodHandler + Send + Sync + 'static) -> Self {
        self.entries.push(HandlerEntry { name, bind: Box::new(bind) });
        self
    }

    #[cfg(test)]
    pub(crate) fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.name).collect()
    }

    /// Binds every method to `instance`.
    pub(crate) fn bind(&self, instance: &Arc<C>) -> Vec<BoundMethod> {
        self.entries
            .iter()
            .map(|e| BoundMethod { name: e.name, handler: (e.bind)(Arc::clone(instance)) })
            .collect()
    }
}

impl<C: Send + Sync + 'static> Default for Methods<C> {
    fn default() -> Self { Self::new() }
}

/// A controller method bound to a concrete instance.
#[derive(Clone, Debug)]
pub struct BoundMethod {
    pub name: &'static str,
    pub handler: MethodHandler,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestHead;
    use crate::descriptor::{MethodDescriptor, ServiceDescriptor};
    use serde::Deserialize;
    use serde_json::json;

    static SVC: ServiceDescriptor = ServiceDescriptor::new(
        "test.v1.Counter",
        &[MethodDescriptor::new("Add", "add", MethodKind::Unary)],
    );

    #[derive(Deserialize)]
    struct Num { n: i64 }

    #[derive(Serialize)]
    struct Total { total: i64 }

    struct Counter { base: i64 }

    impl Counter {
        async fn add(self: Arc<Self>, req: Num, _: CallContext) -> Result<Total, RpcError> {
            Ok(Total { total: self.base + req.n })
        }

        async fn sum(self: Arc<Self>, mut input: Streaming<Num>, _: CallContext) -> Result<Total, RpcError> {
            let mut total = self.base;
            while let Some(item) = input.next().await {
                total += item?.n;
            }
            Ok(Total { total })
        }

        fn count(self: Arc<Self>, req: Num, _: CallContext) -> impl Stream<Item = Result<Total, RpcError>> {
            stream::iter((1..=req.n).map(|total| Ok(Total { total })))
        }
    }

    impl Controller for Counter {
        fn methods() -> Methods<Self> {
            Methods::new()
                .unary("add", Self::add)
                .client_streaming("sum", Self::sum)
                .server_streaming("count", Self::count)
        }
    }

    fn ctx() -> CallContext {
        CallContext::new(&SVC, &SVC.methods[0], RequestHead::default())
    }

    fn bound(name: &str) -> MethodHandler {
        let methods = Counter::methods().bind(&Arc::new(Counter { base: 10 }));
        methods.into_iter().find(|m| m.name == name).unwrap().handler
    }

    #[test]
    fn table_keeps_declaration_order() {
        assert_eq!(Counter::methods().names(), ["add", "sum", "count"]);
    }

    #[tokio::test]
    async fn unary_decodes_and_encodes() {
        let out = bound("add").invoke(Payload::Single(json!({ "n": 5 })), ctx()).await.unwrap();
        assert_eq!(out.into_single(), Some(json!({ "total": 15 })));
    }

    #[tokio::test]
    async fn unary_rejects_malformed_message() {
        let err = bound("add").invoke(Payload::Single(json!({ "n": "five" })), ctx()).await.unwrap_err();
        assert_eq!(err.code(), crate::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn client_streaming_aggregates() {
        let input = stream::iter(vec![Ok(json!({ "n": 1 })), Ok(json!({ "n": 2 }))]).boxed();
        let out = bound("sum").invoke(Payload::Stream(input), ctx()).await.unwrap();
        assert_eq!(out.into_single(), Some(json!({ "total": 13 })));
    }

    #[tokio::test]
    async fn server_streaming_yields_each_element() {
        let out = bound("count").invoke(Payload::Single(json!({ "n": 3 })), ctx()).await.unwrap();
        let items: Vec<_> = out.into_stream().map(Result::unwrap).collect().await;
        assert_eq!(items, vec![json!({ "total": 1 }), json!({ "total": 2 }), json!({ "total": 3 })]);
    }

    #[test]
    fn kinds_follow_builder() {
        assert_eq!(bound("sum").kind(), MethodKind::ClientStreaming);
        assert_eq!(bound("count").kind(), MethodKind::ServerStreaming);
    }
}
