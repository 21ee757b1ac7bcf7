//! Which calls a middleware or interceptor applies to.

use std::fmt;

use crate::descriptor::{MethodDescriptor, ServiceDescriptor};

/// A service/method filter.
///
/// | `service` | `methods` | applies to |
/// |---|---|---|
/// | none | empty | every call |
/// | `S` | empty | every method of `S` |
/// | `S` | `[a, b]` | `S.a` and `S.b` |
/// | none | `[a]` | method `a` of any service |
///
/// A configured method name selects a method when it equals the method's
/// local name exactly, or its wire name ignoring ASCII case. So `"say_many"`
/// and `"saymany"` both select `SayMany`.
#[derive(Clone, Debug, Default)]
pub struct Scope {
    service: Option<&'static str>,
    methods: Vec<String>,
}

impl Scope {
    pub fn on(mut self, service: &'static ServiceDescriptor) -> Self {
        self.service = Some(service.type_name);
        self
    }

    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn matches(&self, service: &str, method: &MethodDescriptor) -> bool {
        if self.service.is_some_and(|s| s != service) {
            return false;
        }
        self.methods.is_empty()
            || self
                .methods
                .iter()
                .any(|m| *m == method.local_name || m.eq_ignore_ascii_case(method.name))
    }
}

/// Renders as the tail of a log line: `to service X methods [a, b]`.
impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.service {
            Some(s) => write!(f, "to service {s}")?,
            None => f.write_str("to all services")?,
        }
        if self.methods.is_empty() {
            f.write_str(" all methods")
        } else {
            write!(f, " methods [{}]", self.methods.join(", "))
        }
    }
}
