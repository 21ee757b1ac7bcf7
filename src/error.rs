//! Unified error types.

/// Misconfiguration caught during bootstrap, before serving begins.
///
/// Every variant is fatal: the step that returned it left the pipeline
/// unchanged, and the application is expected to abort startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{kind} {type_name} is already registered")]
    DuplicateRegistration { kind: &'static str, type_name: &'static str },

    #[error("middlewares have already been initialized")]
    MiddlewaresAlreadyInitialized,

    #[error("guards have already been initialized")]
    GuardsAlreadyInitialized,

    #[error("interceptors have already been initialized")]
    InterceptorsAlreadyInitialized,

    #[error("middlewares must be initialized before guards")]
    GuardsBeforeMiddlewares,

    #[error("pipeline built before {0} were initialized")]
    NotInitialized(&'static str),

    #[error("{kind} {type_name} is not registered")]
    MissingInstance { kind: &'static str, type_name: &'static str },

    #[error("{service}.{method} is not implemented by {controller}")]
    UnboundMethod { service: &'static str, method: &'static str, controller: &'static str },

    #[error("route {0} is bound more than once")]
    DuplicateRoute(String),

    #[error("invalid route: {0}")]
    InvalidRoute(#[from] matchit::InsertError),

    #[error("{controller}.{handler} is {actual}, but {service}.{method} is {declared}")]
    ShapeMismatch {
        controller: &'static str,
        handler: &'static str,
        service: &'static str,
        method: &'static str,
        declared: crate::MethodKind,
        actual: crate::MethodKind,
    },
}

/// The error type returned by the server's fallible operations.
///
/// Per-call faults are [`RpcError`](crate::RpcError)s rendered into HTTP
/// responses, never `Error`s. This type surfaces infrastructure failures:
/// a bad bind address, binding to a port, or a configuration error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{0}`")]
    Addr(String),

    #[error("config: {0}")]
    Config(#[from] ConfigError),
}
