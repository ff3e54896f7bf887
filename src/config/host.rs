use crate::routing::RouteSpec;
use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

/// Host-side configuration for the shipped server binary.
///
/// Describes the composed application: the route entries handed to the
/// router on every request, plus one HTTP origin per binding name.
#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    pub routes: Vec<RouteSpec>,

    #[serde(default)]
    pub smooth_transitions: bool,

    /// Extra asset roots merged into the built-in defaults.
    #[serde(default)]
    pub asset_prefixes: Vec<String>,

    #[serde(default)]
    pub services: Vec<ServiceOrigin>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceOrigin {
    pub name: String,
    pub origin: String,
}

impl HostConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HostConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            Some(ext) => anyhow::bail!("unsupported config format: .{ext}, use .toml or .json"),
            None => anyhow::bail!("config file has no extension, use .toml or .json"),
        };
        config.validate()?;
        tracing::info!(
            "config: loaded, routes={}, services={}",
            config.routes.len(),
            config.services.len()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.routes.is_empty() {
            anyhow::bail!("config must declare at least one route");
        }
        for route in &self.routes {
            if route.binding.is_empty() || route.path.is_empty() {
                anyhow::bail!(
                    "route entry must set both binding and path, got binding={:?}, path={:?}",
                    route.binding,
                    route.path
                );
            }
            if !self.services.iter().any(|s| s.name == route.binding) {
                anyhow::bail!(
                    "route {:?} references service {:?}, which is not declared",
                    route.path,
                    route.binding
                );
            }
        }
        for service in &self.services {
            if service.name.is_empty() || service.origin.is_empty() {
                anyhow::bail!("service entry must set both name and origin");
            }
        }
        Ok(())
    }
}
