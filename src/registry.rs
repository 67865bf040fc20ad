//! The server-side service registry (C6 support): a fully-qualified method
//! path (`/package.Service/Method`) resolves to a boxed handler closure
//! that owns the whole lifecycle of one [`Call`]. Immutable once the server
//! starts accepting connections — generated service code populates it once
//! at startup, the same way a hand-written servicer would.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::call::Call;
use crate::cardinality::Cardinality;
use crate::status::Status;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler produces: the `Call` handed back (so the dispatch layer
/// can tell whether the handler already closed the stream itself) paired
/// with the handler's own outcome. `Ok(())` means close with `Status::ok()`
/// unless the handler already sent its own trailers; `Err(status)` is the
/// trailers-only (or trailing) status to derive if the handler didn't send
/// one already.
pub type HandlerOutput = (Call, Result<(), Status>);

/// One registered RPC method. `cardinality` is carried for introspection;
/// dispatch itself has already been monomorphized into `handler` by the
/// generated stub code that registered it.
#[derive(Clone)]
pub struct Method {
    pub cardinality: Cardinality,
    pub handler: Arc<dyn Fn(Call) -> BoxFuture<'static, HandlerOutput> + Send + Sync>,
}

#[derive(Default, Clone)]
pub struct Registry {
    services: HashMap<String, HashMap<String, Method>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    pub fn add_method(
        &mut self,
        service: &str,
        method: &str,
        cardinality: Cardinality,
        handler: impl Fn(Call) -> BoxFuture<'static, HandlerOutput> + Send + Sync + 'static,
    ) {
        self.services.entry(service.to_owned()).or_default().insert(
            method.to_owned(),
            Method {
                cardinality,
                handler: Arc::new(handler),
            },
        );
    }

    pub fn lookup(&self, path: &str) -> Option<&Method> {
        let (service, method) = split_path(path)?;
        self.services.get(service)?.get(method)
    }
}

/// Splits `/package.Service/Method` into its service and method parts.
fn split_path(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix('/')?;
    let (service, method) = rest.split_once('/')?;
    if service.is_empty() || method.is_empty() {
        return None;
    }
    Some((service, method))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_well_formed_paths() {
        assert_eq!(split_path("/echo.Echo/Say"), Some(("echo.Echo", "Say")));
        assert_eq!(split_path("/Say"), None);
        assert_eq!(split_path("no-leading-slash/Say"), None);
    }

    #[test]
    fn lookup_misses_on_unknown_method() {
        let registry = Registry::new();
        assert!(registry.lookup("/echo.Echo/Say").is_none());
    }
}
