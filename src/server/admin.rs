use super::HostState;
use crate::proxy::context::{full_body, BoxBody};
use hyper::body::Incoming;
use hyper::{Request, Response};

pub fn handle_admin(
    req: Request<Incoming>,
    state: HostState,
) -> Result<Response<BoxBody>, hyper::Error> {
    match req.uri().path() {
        "/health" | "/healthz" => Ok(Response::builder()
            .status(200)
            .body(full_body(r#"{"status":"ok"}"#))
            .unwrap()),

        "/ready" | "/readyz" => Ok(Response::builder()
            .status(200)
            .body(full_body(format!(
                r#"{{"status":"ready","routes":{},"services":{}}}"#,
                state.config.routes.len(),
                state.config.services.len(),
            )))
            .unwrap()),

        "/metrics" => {
            let body = state.metrics.render();
            Ok(Response::builder()
                .status(200)
                .header("content-type", "text/plain; version=0.0.4; charset=utf-8")
                .body(full_body(body))
                .unwrap())
        }

        "/routes" => {
            let routes: Vec<serde_json::Value> = state
                .config
                .routes
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "binding": r.binding,
                        "path": r.path,
                        "preload": r.preload,
                    })
                })
                .collect();

            let body = serde_json::to_string_pretty(&routes).unwrap_or_default();
            Ok(Response::builder()
                .status(200)
                .header("content-type", "application/json")
                .body(full_body(body))
                .unwrap())
        }

        _ => Ok(Response::builder()
            .status(404)
            .body(full_body(r#"{"error":"not found"}"#))
            .unwrap()),
    }
}
