//! Guards: boolean authorization checks run before any middleware or handler.
//!
//! Guards are global. Every registered guard runs for every matched route,
//! in registration order, and the first `false` ends the phase:
//!
//! ```rust
//! use async_trait::async_trait;
//! use tsu_rpc::{ExecutionContext, Guard, RpcError};
//!
//! struct ApiKey;
//!
//! #[async_trait]
//! impl Guard for ApiKey {
//!     async fn can_activate(&self, ctx: &mut ExecutionContext<'_>) -> Result<bool, RpcError> {
//!         Ok(ctx.request().header("x-api-key") == Some("secret"))
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::code::RpcError;
use crate::context::ExecutionContext;

/// An authorization check.
///
/// `Ok(false)` rejects the call with `permission_denied` and the message
/// `Forbidden`. `Err` rejects it with `permission_denied` carrying the
/// error's message, whatever its code.
#[async_trait]
pub trait Guard: Send + Sync + 'static {
    async fn can_activate(&self, ctx: &mut ExecutionContext<'_>) -> Result<bool, RpcError>;
}

/// Runs `guards` in order and stops at the first one that does not allow
/// the call. Guards after it are never polled.
pub async fn execute_guards(guards: &[Arc<dyn Guard>], ctx: &mut ExecutionContext<'_>) -> Result<bool, RpcError> {
    for (i, guard) in guards.iter().enumerate() {
        if !guard.can_activate(ctx).await? {
            debug!(guard = i, handler = ctx.handler_name(), "guard rejected call");
            return Ok(false);
        }
    }
    Ok(true)
}
