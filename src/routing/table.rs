use crate::env::{RequestEnv, ServiceBinding};
use crate::error::GatewayError;
use crate::routing::pattern::{self, CompiledPattern};
use serde::Deserialize;
use std::sync::Arc;

/// Declarative route entry as it appears in `ROUTES`.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteSpec {
    pub binding: String,
    pub path: String,
    #[serde(default)]
    pub preload: bool,
}

/// An immutable compiled route: the original expression, its anchored
/// matcher, and the resolved upstream handle.
pub struct CompiledRoute {
    pub expr: String,
    pub binding: String,
    pub pattern: CompiledPattern,
    pub upstream: Arc<dyn ServiceBinding>,
    pub preload: bool,
}

impl std::fmt::Debug for CompiledRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledRoute")
            .field("expr", &self.expr)
            .field("binding", &self.binding)
            .field("pattern", &self.pattern)
            .field("preload", &self.preload)
            .finish()
    }
}

impl CompiledRoute {
    fn is_root(&self) -> bool {
        self.pattern.static_mount.as_deref() == Some("/") || self.expr == "/"
    }
}

/// A selected route plus the mount actual captured from the incoming path.
pub struct RouteMatch {
    pub route: Arc<CompiledRoute>,
    pub mount: String,
}

/// The per-request route table.
///
/// Built fresh from the environment map on every request. After
/// construction the entries are sorted descending by
/// `(base_specificity, expression length)`; selection is by score, so the
/// ordering only pins down iteration for determinism.
#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<Arc<CompiledRoute>>,
}

impl RouteTable {
    pub fn build(specs: &[RouteSpec], env: &RequestEnv) -> Result<Self, GatewayError> {
        if specs.is_empty() {
            return Err(GatewayError::Config(
                "ROUTES must contain at least one route".to_string(),
            ));
        }

        let mut routes = Vec::with_capacity(specs.len());
        for spec in specs {
            if spec.binding.is_empty() || spec.path.is_empty() {
                return Err(GatewayError::Config(format!(
                    "route entry must set both binding and path, got binding={:?}, path={:?}",
                    spec.binding, spec.path
                )));
            }
            let upstream = env.binding(&spec.binding).ok_or_else(|| {
                GatewayError::Config(format!(
                    "binding {:?} is not present in the environment",
                    spec.binding
                ))
            })?;
            let compiled = pattern::compile(&spec.path)?;
            tracing::debug!(
                "routing: compiled route, binding={}, path={}, static={}, specificity={}",
                spec.binding,
                spec.path,
                compiled.is_static_mount(),
                compiled.base_specificity,
            );
            routes.push(Arc::new(CompiledRoute {
                expr: pattern::normalize(&spec.path),
                binding: spec.binding.clone(),
                pattern: compiled,
                upstream,
                preload: spec.preload,
            }));
        }

        routes.sort_by(|a, b| {
            b.pattern
                .base_specificity
                .cmp(&a.pattern.base_specificity)
                .then_with(|| b.expr.len().cmp(&a.expr.len()))
        });

        Ok(Self { routes })
    }

    /// Select the route for an incoming path.
    ///
    /// All routes are scanned; the match with the highest
    /// `len(mount)*1_000_000 + base_specificity*1_000 + len(expr)` score
    /// wins. When nothing matches, a root route (expression `/`) is
    /// selected with mount `/` if one exists.
    pub fn select(&self, path: &str) -> Option<RouteMatch> {
        let mut best: Option<(u64, RouteMatch)> = None;
        let mut root: Option<&Arc<CompiledRoute>> = None;

        for route in &self.routes {
            if root.is_none() && route.is_root() {
                root = Some(route);
            }
            let Some(caps) = route.pattern.matcher.captures(path) else {
                continue;
            };
            let raw = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            // A bare trailing-wildcard expression captures an empty mount;
            // normalize it to the root mount.
            let mount = if raw.is_empty() { "/" } else { raw };
            let score = raw.len() as u64 * 1_000_000
                + route.pattern.base_specificity as u64 * 1_000
                + route.expr.len() as u64;
            if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
                best = Some((
                    score,
                    RouteMatch {
                        route: route.clone(),
                        mount: mount.to_string(),
                    },
                ));
            }
        }

        match best {
            Some((_, m)) => Some(m),
            None => root.map(|route| RouteMatch {
                route: route.clone(),
                mount: "/".to_string(),
            }),
        }
    }

    pub fn routes(&self) -> &[Arc<CompiledRoute>] {
        &self.routes
    }

    /// Preload-flagged static mounts other than `current`.
    pub fn preload_targets(&self, current: &str) -> Vec<String> {
        self.routes
            .iter()
            .filter(|r| r.preload)
            .filter_map(|r| r.pattern.static_mount.clone())
            .filter(|mount| mount != current)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::context::{full_body, BoxBody};
    use futures_util::future::BoxFuture;
    use hyper::{Request, Response};

    struct StubService;

    impl ServiceBinding for StubService {
        fn fetch(
            &self,
            _req: Request<BoxBody>,
        ) -> BoxFuture<'_, Result<Response<BoxBody>, GatewayError>> {
            Box::pin(async { Ok(Response::new(full_body("stub"))) })
        }
    }

    fn env_with(bindings: &[&str]) -> RequestEnv {
        let mut env = RequestEnv::new();
        for name in bindings {
            env = env.with_binding(name, Arc::new(StubService));
        }
        env
    }

    fn spec(binding: &str, path: &str) -> RouteSpec {
        RouteSpec {
            binding: binding.to_string(),
            path: path.to_string(),
            preload: false,
        }
    }

    fn table(specs: &[RouteSpec]) -> RouteTable {
        let names: Vec<&str> = specs.iter().map(|s| s.binding.as_str()).collect();
        RouteTable::build(specs, &env_with(&names)).unwrap()
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(RouteTable::build(&[], &env_with(&[])).is_err());
    }

    #[test]
    fn test_missing_binding_rejected() {
        let err = RouteTable::build(&[spec("APP", "/app")], &env_with(&[])).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn test_blank_fields_rejected() {
        assert!(RouteTable::build(&[spec("", "/app")], &env_with(&[""])).is_err());
        assert!(RouteTable::build(&[spec("APP", "")], &env_with(&["APP"])).is_err());
    }

    #[test]
    fn test_sorted_by_specificity_then_length() {
        let t = table(&[
            spec("A", "/a"),
            spec("DEEP", "/app/api/users"),
            spec("PARAM", "/:tenant"),
            spec("APP", "/app"),
        ]);
        let order: Vec<&str> = t.routes().iter().map(|r| r.expr.as_str()).collect();
        assert_eq!(order, vec!["/app/api/users", "/app", "/a", "/:tenant"]);

        for pair in t.routes().windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                (a.pattern.base_specificity, a.expr.len())
                    >= (b.pattern.base_specificity, b.expr.len())
            );
        }
    }

    #[test]
    fn test_longest_mount_wins() {
        let t = table(&[spec("APP", "/app"), spec("API", "/app/api")]);
        let m = t.select("/app/api/users").unwrap();
        assert_eq!(m.route.binding, "API");
        assert_eq!(m.mount, "/app/api");
    }

    #[test]
    fn test_static_beats_parameter_at_same_mount_length() {
        let t = table(&[spec("TENANT", "/:tenant"), spec("APP", "/app")]);
        let m = t.select("/app/page").unwrap();
        assert_eq!(m.route.binding, "APP");
    }

    #[test]
    fn test_parameter_mount_capture() {
        let t = table(&[spec("USER", "/user/:id")]);
        let m = t.select("/user/42/profile").unwrap();
        assert_eq!(m.mount, "/user/42");
    }

    #[test]
    fn test_root_fallback() {
        let t = table(&[spec("ROOT", "/"), spec("APP", "/app")]);
        let m = t.select("/other").unwrap();
        assert_eq!(m.route.binding, "ROOT");
        assert_eq!(m.mount, "/");
    }

    #[test]
    fn test_no_match_without_root() {
        let t = table(&[spec("APP", "/app")]);
        assert!(t.select("/other").is_none());
    }

    #[test]
    fn test_mount_prefix_invariant() {
        let t = table(&[spec("APP", "/app"), spec("USER", "/user/:id")]);
        for path in ["/app", "/app/x/y", "/user/7", "/user/7/posts"] {
            let m = t.select(path).unwrap();
            assert!(path == m.mount || path.starts_with(&format!("{}/", m.mount)));
        }
    }

    #[test]
    fn test_preload_targets_exclude_current() {
        let specs = vec![
            RouteSpec {
                preload: true,
                ..spec("A", "/a")
            },
            RouteSpec {
                preload: true,
                ..spec("B", "/b")
            },
            spec("C", "/c"),
        ];
        let t = table(&specs);
        let targets = t.preload_targets("/a");
        assert_eq!(targets, vec!["/b".to_string()]);
    }
}
