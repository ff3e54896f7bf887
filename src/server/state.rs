use crate::config::{self, HostConfig};
use crate::env::{RequestEnv, ServiceBinding};
use crate::metrics::Metrics;
use crate::upstream::HttpOrigin;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Shared host state, cheaply cloneable.
///
/// Holds the pre-serialized `ROUTES` / `ASSET_PREFIXES` values and one
/// long-lived `HttpOrigin` per service. The router still materializes its
/// route table per request from the environment this state hands out —
/// the state only owns the binding lifetimes.
#[derive(Clone)]
pub struct HostState {
    routes_value: Arc<serde_json::Value>,
    asset_prefixes_value: Option<Arc<serde_json::Value>>,
    bindings: HashMap<String, Arc<dyn ServiceBinding>>,
    pub config: Arc<HostConfig>,
    pub metrics: Metrics,
}

impl HostState {
    pub fn new(config: HostConfig) -> Result<Self> {
        let mut bindings: HashMap<String, Arc<dyn ServiceBinding>> = HashMap::new();
        for service in &config.services {
            let origin = HttpOrigin::new(&service.name, &service.origin)?;
            info!(
                "upstream: service bound, name={}, origin={}",
                service.name, service.origin
            );
            bindings.insert(service.name.clone(), Arc::new(origin));
        }

        let routes_value = serde_json::json!({
            "routes": config
                .routes
                .iter()
                .map(|r| serde_json::json!({
                    "binding": r.binding,
                    "path": r.path,
                    "preload": r.preload,
                }))
                .collect::<Vec<_>>(),
            "smoothTransitions": config.smooth_transitions,
        });

        let asset_prefixes_value = if config.asset_prefixes.is_empty() {
            None
        } else {
            Some(Arc::new(serde_json::Value::String(serde_json::to_string(
                &config.asset_prefixes,
            )?)))
        };

        let metrics = Metrics::install();

        Ok(Self {
            routes_value: Arc::new(routes_value),
            asset_prefixes_value,
            bindings,
            config: Arc::new(config),
            metrics,
        })
    }

    /// Materialize the environment map for one request. Values are
    /// snapshots; bindings are shared handles owned by this state.
    pub fn request_env(&self) -> RequestEnv {
        let mut env = RequestEnv::new().with_var(config::ROUTES_VAR, (*self.routes_value).clone());
        if let Some(prefixes) = &self.asset_prefixes_value {
            env = env.with_var(config::ASSET_PREFIXES_VAR, (**prefixes).clone());
        }
        for (name, binding) in &self.bindings {
            env = env.with_binding(name, binding.clone());
        }
        env
    }
}
