//! Static service and method descriptors.
//!
//! Descriptors are generated elsewhere (from `.proto` files) and live for the
//! whole process as `&'static` data. Declare them as constants:
//!
//! ```rust
//! use tsu_rpc::{MethodDescriptor, MethodKind, ServiceDescriptor};
//!
//! pub static ELIZA: ServiceDescriptor = ServiceDescriptor::new(
//!     "connectrpc.eliza.v1.ElizaService",
//!     &[
//!         MethodDescriptor::new("Say",        "say",        MethodKind::Unary),
//!         MethodDescriptor::new("SayMany",    "sayMany",    MethodKind::ClientStreaming),
//!         MethodDescriptor::new("ListenMany", "listenMany", MethodKind::ServerStreaming),
//!     ],
//! );
//! ```

use std::fmt;
use std::str::FromStr;

/// The streaming shape of an RPC method.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MethodKind {
    /// One request, one response.
    Unary,
    /// Many requests, one aggregate response.
    ClientStreaming,
    /// One request, many sequential responses.
    ServerStreaming,
    /// Many requests, many responses.
    BidiStreaming,
}

impl MethodKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unary           => "unary",
            Self::ClientStreaming => "client_streaming",
            Self::ServerStreaming => "server_streaming",
            Self::BidiStreaming   => "bidi_streaming",
        }
    }

    /// `true` when the client sends a sequence of messages.
    pub fn streams_input(self) -> bool {
        matches!(self, Self::ClientStreaming | Self::BidiStreaming)
    }

    /// `true` when the server answers with a sequence of messages.
    pub fn streams_output(self) -> bool {
        matches!(self, Self::ServerStreaming | Self::BidiStreaming)
    }
}

impl FromStr for MethodKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unary"            => Ok(Self::Unary),
            "client_streaming" => Ok(Self::ClientStreaming),
            "server_streaming" => Ok(Self::ServerStreaming),
            "bidi_streaming"   => Ok(Self::BidiStreaming),
            _                  => Err(()),
        }
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Descriptors ───────────────────────────────────────────────────────────────

/// One declared RPC method.
#[derive(Debug)]
pub struct MethodDescriptor {
    /// Wire name as it appears in the URL, e.g. `"SayMany"`.
    pub name: &'static str,
    /// Idiomatic local name, e.g. `"sayMany"` or `"say_many"`.
    pub local_name: &'static str,
    pub kind: MethodKind,
}

impl MethodDescriptor {
    pub const fn new(name: &'static str, local_name: &'static str, kind: MethodKind) -> Self {
        Self { name, local_name, kind }
    }
}

/// A service: its fully-qualified type name and its methods.
#[derive(Debug)]
pub struct ServiceDescriptor {
    pub type_name: &'static str,
    pub methods: &'static [MethodDescriptor],
}

impl ServiceDescriptor {
    pub const fn new(type_name: &'static str, methods: &'static [MethodDescriptor]) -> Self {
        Self { type_name, methods }
    }

    /// Looks up a method by its exact wire name.
    pub fn method(&self, name: &str) -> Option<&'static MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// The route path for one of this service's methods: `/{type_name}/{name}`.
    pub fn path(&self, method: &MethodDescriptor) -> String {
        format!("/{}/{}", self.type_name, method.name)
    }
}

impl PartialEq for ServiceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
    }
}

impl Eq for ServiceDescriptor {}

#[cfg(test)]
mod tests {
    use super::*;

    static SVC: ServiceDescriptor = ServiceDescriptor::new(
        "test.v1.Echo",
        &[
            MethodDescriptor::new("Echo", "echo", MethodKind::Unary),
            MethodDescriptor::new("Chat", "chat", MethodKind::BidiStreaming),
        ],
    );

    #[test]
    fn method_lookup_is_exact() {
        assert!(SVC.method("Echo").is_some());
        assert!(SVC.method("echo").is_none());
    }

    #[test]
    fn path_uses_wire_name() {
        let m = SVC.method("Chat").unwrap();
        assert_eq!(SVC.path(m), "/test.v1.Echo/Chat");
    }

    #[test]
    fn kind_shapes() {
        assert!(MethodKind::BidiStreaming.streams_input());
        assert!(MethodKind::BidiStreaming.streams_output());
        assert!(!MethodKind::Unary.streams_output());
        assert_eq!("server_streaming".parse::<MethodKind>(), Ok(MethodKind::ServerStreaming));
    }
}
