//! Turns middleware configs into scoped hooks, once, at initialization.

use std::sync::Arc;

use http::HeaderMap;
use tracing::{debug, info, warn};

use super::{Middleware, MiddlewareConfig};
use crate::code::RpcError;
use crate::context::RequestHead;
use crate::descriptor::MethodDescriptor;
use crate::error::ConfigError;
use crate::registry::Registry;
use crate::scope::Scope;

/// A middleware instance with the scope it was configured for.
pub(crate) struct MiddlewareHook {
    name: &'static str,
    instance: Arc<dyn Middleware>,
    scope: Scope,
}

impl MiddlewareHook {
    pub(crate) fn applies(&self, service: &str, method: &MethodDescriptor) -> bool {
        self.scope.matches(service, method)
    }
}

/// Resolves every config against the registry, keeping config order.
///
/// A config whose type was never registered is skipped with a warning, or
/// fails in strict mode. A type registered several times yields one hook per
/// instance, in registration order.
pub(crate) fn bind_middlewares(
    registry: &Registry<dyn Middleware>,
    configs: Vec<MiddlewareConfig>,
    strict: bool,
) -> Result<Vec<MiddlewareHook>, ConfigError> {
    let mut hooks = Vec::with_capacity(configs.len());

    for config in configs {
        let name = config.target.name();
        let before = hooks.len();

        for reg in registry.get_all(config.target.id()) {
            hooks.push(MiddlewareHook {
                name,
                instance: Arc::clone(&reg.instance),
                scope: config.scope.clone(),
            });
        }

        if hooks.len() == before {
            if strict {
                return Err(ConfigError::MissingInstance { kind: "middleware", type_name: name });
            }
            warn!(middleware = name, "middleware not found in registry, did you forget to register it?");
            continue;
        }

        info!("applied middleware: {name} {}", config.scope);
    }

    Ok(hooks)
}

/// Runs the hooks that apply to `service`/`method`, in order, stopping at the
/// first error.
pub(crate) async fn run_hooks(
    hooks: &[MiddlewareHook],
    service: &str,
    method: &MethodDescriptor,
    req: &mut RequestHead,
    res: &mut HeaderMap,
) -> Result<(), RpcError> {
    for hook in hooks.iter().filter(|h| h.applies(service, method)) {
        if let Err(e) = hook.instance.handle(req, res).await {
            debug!(middleware = hook.name, error = %e, "middleware aborted call");
            return Err(e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::descriptor::{MethodKind, ServiceDescriptor};
    use crate::registry::{RegisterOptions, TypeKey};

    static SVC: ServiceDescriptor = ServiceDescriptor::new(
        "test.v1.Svc",
        &[
            MethodDescriptor::new("One", "one", MethodKind::Unary),
            MethodDescriptor::new("Two", "two", MethodKind::Unary),
        ],
    );

    type Log = Arc<Mutex<Vec<&'static str>>>;

    struct First(Log);
    struct Second(Log);
    struct Failing;

    #[async_trait]
    impl Middleware for First {
        async fn handle(&self, _: &mut RequestHead, _: &mut HeaderMap) -> Result<(), RpcError> {
            self.0.lock().unwrap().push("first");
            Ok(())
        }
    }

    #[async_trait]
    impl Middleware for Second {
        async fn handle(&self, _: &mut RequestHead, _: &mut HeaderMap) -> Result<(), RpcError> {
            self.0.lock().unwrap().push("second");
            Ok(())
        }
    }

    #[async_trait]
    impl Middleware for Failing {
        async fn handle(&self, _: &mut RequestHead, _: &mut HeaderMap) -> Result<(), RpcError> {
            Err(RpcError::unauthenticated("no token"))
        }
    }

    fn registry(log: &Log) -> Registry<dyn Middleware> {
        let mut reg: Registry<dyn Middleware> = Registry::new("middleware");
        reg.register(TypeKey::of::<First>(), Arc::new(First(log.clone())), RegisterOptions::default()).unwrap();
        reg.register(TypeKey::of::<Second>(), Arc::new(Second(log.clone())), RegisterOptions::default()).unwrap();
        reg.register(TypeKey::of::<Failing>(), Arc::new(Failing), RegisterOptions::default()).unwrap();
        reg
    }

    async fn run(hooks: &[MiddlewareHook], method: &str) -> Result<(), RpcError> {
        let method = SVC.method(method).unwrap();
        run_hooks(hooks, SVC.type_name, method, &mut RequestHead::default(), &mut HeaderMap::new()).await
    }

    #[tokio::test]
    async fn config_order_wins_over_registration_order() {
        let log = Log::default();
        let hooks = bind_middlewares(
            &registry(&log),
            vec![MiddlewareConfig::of::<Second>(), MiddlewareConfig::of::<First>()],
            false,
        )
        .unwrap();
        run(&hooks, "One").await.unwrap();
        assert_eq!(*log.lock().unwrap(), ["second", "first"]);
    }

    #[tokio::test]
    async fn scoped_hook_skips_other_methods() {
        let log = Log::default();
        let hooks = bind_middlewares(
            &registry(&log),
            vec![
                MiddlewareConfig::of::<First>().on(&SVC),
                MiddlewareConfig::of::<Second>().on(&SVC).methods(["one"]),
            ],
            false,
        )
        .unwrap();
        run(&hooks, "Two").await.unwrap();
        assert_eq!(*log.lock().unwrap(), ["first"]);
    }

    #[tokio::test]
    async fn error_stops_the_chain() {
        let log = Log::default();
        let hooks = bind_middlewares(
            &registry(&log),
            vec![MiddlewareConfig::of::<Failing>(), MiddlewareConfig::of::<First>()],
            false,
        )
        .unwrap();
        let err = run(&hooks, "One").await.unwrap_err();
        assert_eq!(err.code(), crate::Code::Unauthenticated);
        assert!(log.lock().unwrap().is_empty());
    }

    struct Unregistered;

    #[async_trait]
    impl Middleware for Unregistered {
        async fn handle(&self, _: &mut RequestHead, _: &mut HeaderMap) -> Result<(), RpcError> {
            Ok(())
        }
    }

    #[test]
    fn missing_instance_is_skipped_unless_strict() {
        let log = Log::default();
        let reg = registry(&log);
        let hooks = bind_middlewares(&reg, vec![MiddlewareConfig::of::<Unregistered>()], false).unwrap();
        assert!(hooks.is_empty());

        let err = bind_middlewares(&reg, vec![MiddlewareConfig::of::<Unregistered>()], true).err().unwrap();
        assert!(matches!(err, ConfigError::MissingInstance { kind: "middleware", .. }));
    }
}
