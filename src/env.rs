use crate::error::GatewayError;
use crate::proxy::context::BoxBody;
use futures_util::future::BoxFuture;
use hyper::{Request, Response};
use std::collections::HashMap;
use std::sync::Arc;

/// The single capability a sub-worker exposes: forward a request, get a
/// response. Bindings are externally owned handles — the router borrows
/// them for the duration of one request and never closes them.
pub trait ServiceBinding: Send + Sync {
    fn fetch(
        &self,
        req: Request<BoxBody>,
    ) -> BoxFuture<'_, Result<Response<BoxBody>, GatewayError>>;
}

/// Per-request environment map.
///
/// Carries the variable side (`ROUTES`, `ASSET_PREFIXES`, ...) as JSON
/// values plus one `ServiceBinding` per route binding name. The map is
/// read-only for the duration of a request; nothing in it survives the
/// request.
#[derive(Clone, Default)]
pub struct RequestEnv {
    vars: HashMap<String, serde_json::Value>,
    bindings: HashMap<String, Arc<dyn ServiceBinding>>,
}

impl RequestEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: &str, value: serde_json::Value) -> Self {
        self.vars.insert(key.to_string(), value);
        self
    }

    pub fn with_binding(mut self, name: &str, binding: Arc<dyn ServiceBinding>) -> Self {
        self.bindings.insert(name.to_string(), binding);
        self
    }

    pub fn var(&self, key: &str) -> Option<&serde_json::Value> {
        self.vars.get(key)
    }

    /// Resolve a binding by name, checking only for presence — the trait
    /// object itself is the fetch capability.
    pub fn binding(&self, name: &str) -> Option<Arc<dyn ServiceBinding>> {
        self.bindings.get(name).cloned()
    }
}
