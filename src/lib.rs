//! # tsu-rpc
//!
//! Route dispatch for Connect-style RPC services, with NestJS-flavoured
//! guards, scoped middlewares and interceptors, on a minimal hyper server.
//!
//! ## The contract
//!
//! Service *definitions* come from elsewhere: a static [`ServiceDescriptor`]
//! names the service and its methods with their streaming shapes. This crate
//! owns what happens between "an HTTP request arrived" and "a controller
//! method ran":
//!
//! ```text
//! POST /{service}/{method}
//!   → guards        global, registration order, first `false` → 403
//!   → middlewares   scoped per service / method, config order
//!   → interceptors  scoped, composed around the handler, config order
//!   → handler       the controller method the path is bound to
//! ```
//!
//! There is no global state. A [`ConnectRpc`] value owns every registry; once
//! the pipeline is built it becomes an immutable [`Dispatcher`].
//!
//! What the reverse proxy already owns (TLS, rate limiting, body-size limits)
//! this crate leaves to it.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde::{Deserialize, Serialize};
//! use tsu_rpc::*;
//!
//! static ELIZA: ServiceDescriptor = ServiceDescriptor::new(
//!     "connectrpc.eliza.v1.ElizaService",
//!     &[MethodDescriptor::new("Say", "say", MethodKind::Unary)],
//! );
//!
//! #[derive(Deserialize)]
//! struct SayRequest { sentence: String }
//! #[derive(Serialize)]
//! struct SayResponse { sentence: String }
//!
//! struct Eliza;
//!
//! impl Eliza {
//!     async fn say(self: Arc<Self>, req: SayRequest, _: CallContext) -> Result<SayResponse, RpcError> {
//!         Ok(SayResponse { sentence: format!("You said: {}", req.sentence) })
//!     }
//! }
//!
//! impl Controller for Eliza {
//!     fn methods() -> Methods<Self> {
//!         Methods::new().unary("say", Self::say)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let mut rpc = ConnectRpc::new();
//!     rpc.register_controller(Eliza, &ELIZA, RegisterOptions::default())?;
//!     rpc.init_middlewares([])?;
//!     rpc.init_guards()?;
//!
//!     Server::bind("0.0.0.0:3000")?.serve(rpc.build()?).await
//! }
//! ```

mod code;
mod codec;
mod connect;
mod context;
mod descriptor;
mod dispatch;
mod error;
mod guard;
mod handler;
mod interceptor;
mod mapper;
mod registry;
mod response;
mod scope;
mod server;

pub mod middleware;

pub use code::{Code, RpcError};
pub use connect::ConnectRpc;
pub use context::{CallContext, ExecutionContext, RequestHead};
pub use descriptor::{MethodDescriptor, MethodKind, ServiceDescriptor};
pub use dispatch::Dispatcher;
pub use error::{ConfigError, Error};
pub use guard::{Guard, execute_guards};
pub use handler::{BoundMethod, Controller, Message, MessageStream, MethodHandler, Methods, Payload, Streaming};
pub use interceptor::{Interceptor, InterceptorConfig, Next, RpcRequest, next_fn};
pub use mapper::{MethodMappings, discover_method_mappings};
pub use middleware::{Middleware, MiddlewareConfig};
pub use registry::{
    ControllerRegistration, Registration, Registries, Registry, RegisterOptions, RouteMetadata, RouteStore, TypeKey,
};
pub use response::{Body, Response};
pub use scope::Scope;
pub use server::Server;
