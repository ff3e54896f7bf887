mod host;


pub use host::{HostConfig, ServiceOrigin};

use crate::env::RequestEnv;
use crate::error::GatewayError;
use crate::rewrite::AssetPrefixSet;
use crate::routing::{RouteSpec, RouteTable};
use serde::Deserialize;

pub const ROUTES_VAR: &str = "ROUTES";
pub const ASSET_PREFIXES_VAR: &str = "ASSET_PREFIXES";

#[derive(Debug, Clone, Copy, Default)]
pub struct ProxyOptions {
    pub smooth_transitions: bool,
}

/// Object form of the `ROUTES` value.
#[derive(Debug, Deserialize)]
struct RoutesDocument {
    routes: Vec<RouteSpec>,
    #[serde(rename = "smoothTransitions", default)]
    smooth_transitions: bool,
}

/// Everything `handle` needs, materialized from the environment map.
/// Rebuilt on every request; nothing is retained across requests.
#[derive(Debug)]
pub struct RequestConfig {
    pub table: RouteTable,
    pub assets: AssetPrefixSet,
    pub options: ProxyOptions,
}

impl RequestConfig {
    pub fn from_env(env: &RequestEnv) -> Result<Self, GatewayError> {
        let raw = env.var(ROUTES_VAR).ok_or_else(|| {
            GatewayError::Config("ROUTES environment variable is required".to_string())
        })?;

        let doc: serde_json::Value = match raw {
            serde_json::Value::String(s) => serde_json::from_str(s)
                .map_err(|e| GatewayError::Config(format!("Failed to parse ROUTES: {}", e)))?,
            serde_json::Value::Object(_) | serde_json::Value::Array(_) => raw.clone(),
            _ => {
                return Err(GatewayError::Config(
                    "ROUTES must be a JSON object or a JSON string".to_string(),
                ))
            }
        };

        let (specs, options) = match doc {
            // The bare-array form never carries options.
            arr @ serde_json::Value::Array(_) => {
                let specs: Vec<RouteSpec> = serde_json::from_value(arr)
                    .map_err(|e| GatewayError::Config(format!("Failed to parse ROUTES: {}", e)))?;
                (specs, ProxyOptions::default())
            }
            obj @ serde_json::Value::Object(_) => {
                let parsed: RoutesDocument = serde_json::from_value(obj)
                    .map_err(|e| GatewayError::Config(format!("Failed to parse ROUTES: {}", e)))?;
                (
                    parsed.routes,
                    ProxyOptions {
                        smooth_transitions: parsed.smooth_transitions,
                    },
                )
            }
            _ => {
                return Err(GatewayError::Config(
                    "ROUTES must be a JSON object or a JSON string".to_string(),
                ))
            }
        };

        let table = RouteTable::build(&specs, env)?;
        let assets = asset_prefixes(env);

        Ok(Self {
            table,
            assets,
            options,
        })
    }
}

/// Materialize the asset-prefix set: defaults, unioned with a valid
/// `ASSET_PREFIXES` JSON-string array. Anything malformed silently falls
/// back to the defaults.
fn asset_prefixes(env: &RequestEnv) -> AssetPrefixSet {
    let set = AssetPrefixSet::default();
    let Some(serde_json::Value::String(raw)) = env.var(ASSET_PREFIXES_VAR) else {
        return set;
    };
    let parsed: Vec<String> = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!("config: ASSET_PREFIXES ignored, error={}", e);
            return set;
        }
    };
    AssetPrefixSet::with_extra(parsed.iter().filter(|p| !p.is_empty()))
}
