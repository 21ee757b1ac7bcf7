//! Matching declared RPC methods to controller methods.

use crate::descriptor::{MethodDescriptor, ServiceDescriptor};

/// The outcome of mapping one controller onto one service.
#[derive(Debug, Default)]
pub struct MethodMappings {
    /// RPC method → name of the controller method implementing it, in
    /// declaration order of the service.
    pub bound: Vec<(&'static MethodDescriptor, &'static str)>,
    /// RPC methods nothing implements. Calling one fails with
    /// `unimplemented`.
    pub unbound: Vec<&'static MethodDescriptor>,
}

impl MethodMappings {
    /// The controller method bound to the RPC method with wire name `rpc`.
    pub fn get(&self, rpc: &str) -> Option<&'static str> {
        self.bound.iter().find(|(m, _)| m.name == rpc).map(|(_, h)| *h)
    }
}

/// Resolves which of `handler_methods` implements each of `service`'s methods.
///
/// Per RPC method the first rule that matches wins:
///
/// 1. a handler method named exactly like the method's `local_name`;
/// 2. a handler method equal to the wire `name`, ignoring ASCII case.
pub fn discover_method_mappings(handler_methods: &[&'static str], service: &'static ServiceDescriptor) -> MethodMappings {
    let mut mappings = MethodMappings::default();

    for method in service.methods {
        let found = handler_methods
            .iter()
            .find(|h| **h == method.local_name)
            .or_else(|| handler_methods.iter().find(|h| h.eq_ignore_ascii_case(method.name)));

        match found {
            Some(h) => mappings.bound.push((method, *h)),
            None => mappings.unbound.push(method),
        }
    }

    mappings
}
