//! RPC error codes and the per-call error type.
//!
//! Codes follow the Connect protocol's names and HTTP mapping. Handlers,
//! guards, middlewares and interceptors all fail with [`RpcError`]; the
//! transport renders it as
//!
//! ```text
//! HTTP/1.1 403 Forbidden
//! content-type: application/json
//!
//! {"code":"permission_denied","message":"Forbidden"}
//! ```

use std::fmt;

use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Every error code a call can end with.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Code {
    Canceled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl Code {
    /// Returns the snake_case wire name (e.g. `"permission_denied"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Canceled           => "canceled",
            Self::Unknown            => "unknown",
            Self::InvalidArgument    => "invalid_argument",
            Self::DeadlineExceeded   => "deadline_exceeded",
            Self::NotFound           => "not_found",
            Self::AlreadyExists      => "already_exists",
            Self::PermissionDenied   => "permission_denied",
            Self::ResourceExhausted  => "resource_exhausted",
            Self::FailedPrecondition => "failed_precondition",
            Self::Aborted            => "aborted",
            Self::OutOfRange         => "out_of_range",
            Self::Unimplemented      => "unimplemented",
            Self::Internal           => "internal",
            Self::Unavailable        => "unavailable",
            Self::DataLoss           => "data_loss",
            Self::Unauthenticated    => "unauthenticated",
        }
    }

    /// The HTTP status a unary response carries for this code.
    pub fn http_status(self) -> StatusCode {
        let code = match self {
            Self::Canceled           => 499,
            Self::Unknown            => 500,
            Self::InvalidArgument    => 400,
            Self::DeadlineExceeded   => 504,
            Self::NotFound           => 404,
            Self::AlreadyExists      => 409,
            Self::PermissionDenied   => 403,
            Self::ResourceExhausted  => 429,
            Self::FailedPrecondition => 400,
            Self::Aborted            => 409,
            Self::OutOfRange         => 400,
            Self::Unimplemented      => 501,
            Self::Internal           => 500,
            Self::Unavailable        => 503,
            Self::DataLoss           => 500,
            Self::Unauthenticated    => 401,
        };
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── RpcError ──────────────────────────────────────────────────────────────────

/// A per-call fault: a [`Code`] plus a human-readable message.
///
/// Serializes to exactly the error payload the transport sends.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct RpcError {
    pub code: Code,
    pub message: String,
}

impl RpcError {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(Code::PermissionDenied, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(Code::Unauthenticated, message)
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(Code::Unimplemented, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    pub fn code(&self) -> Code { self.code }
    pub fn message(&self) -> &str { &self.message }
}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_payload_shape() {
        let err = RpcError::permission_denied("Forbidden");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json, serde_json::json!({ "code": "permission_denied", "message": "Forbidden" }));
        assert_eq!(err.code().http_status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn wire_name_matches_serde_name() {
        for code in [Code::Canceled, Code::OutOfRange, Code::Unimplemented, Code::DataLoss] {
            let json = serde_json::to_value(code).unwrap();
            assert_eq!(json, serde_json::Value::String(code.as_str().to_owned()));
        }
    }

    #[test]
    fn unimplemented_maps_to_501() {
        assert_eq!(Code::Unimplemented.http_status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(Code::Canceled.http_status().as_u16(), 499);
    }
}
