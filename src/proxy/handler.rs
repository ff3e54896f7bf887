use crate::config::RequestConfig;
use crate::env::RequestEnv;
use crate::error::GatewayError;
use crate::proxy::context::{empty_body, full_body, BoxBody, RequestContext};
use crate::proxy::preload;
use crate::rewrite::css::rewrite_css;
use crate::rewrite::headers::{rewrite_location, rewrite_set_cookie};
use crate::rewrite::html::{rewrite_html, HtmlRewriteOptions};
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, ETAG, HOST, USER_AGENT};
use http::{HeaderMap, StatusCode, Uri};
use http_body_util::BodyExt;
use hyper::{Request, Response};
use std::time::Instant;
use tracing::{debug, warn};
use url::Url;

/// Handle one incoming request through the front-door lifecycle:
///
/// 1. CONFIG     — materialize route table, asset prefixes, options
/// 2. ROUTE      — score-based selection, root fallback, 404
/// 3. FORWARD    — strip the mount from the path, short-circuit preload
/// 4. UPSTREAM   — fetch from the bound service
/// 5. TRANSFORM  — branch by status and content type, rewrite
/// 6. LOG        — access line + metrics
///
/// Configuration errors surface as `Err`; the host maps them to a 5xx.
/// Upstream fetch failures propagate unchanged.
pub async fn handle(
    req: Request<BoxBody>,
    env: &RequestEnv,
) -> Result<Response<BoxBody>, GatewayError> {
    let cfg = RequestConfig::from_env(env)?;

    let host = req
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let uri_path = req.uri().path().to_string();
    let method = req.method().as_str().to_string();
    let mut ctx = RequestContext::new(host, uri_path.clone(), method);

    let Some(matched) = cfg.table.select(&uri_path) else {
        debug!("proxy: no route matched, path={}", ctx.uri_path);
        return Ok(ctx.error_response(StatusCode::NOT_FOUND, "Not found"));
    };
    ctx.binding = matched.route.binding.clone();
    ctx.mount = matched.mount.clone();

    metrics::gauge!(
        "mosaic_http_requests_in_flight",
        "route" => ctx.binding.clone(),
    )
    .increment(1.0);

    let forward_path = forward_path(&uri_path, &matched.mount);

    let preload_targets = cfg.table.preload_targets(&matched.mount);
    if !preload_targets.is_empty() && forward_path == preload::SCRIPT_PATH {
        debug!(
            "proxy: preload script synthesized, mount={}, targets={}",
            ctx.mount,
            preload_targets.len()
        );
        let resp = preload::script_response(&preload_targets);
        ctx.finalize_metrics(resp.status().as_u16());
        return Ok(resp);
    }

    let origin = request_origin(&req);
    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let upstream_req = forward_request(req, &forward_path)?;
    ctx.upstream_start = Some(Instant::now());
    let upstream_resp = match matched.route.upstream.fetch(upstream_req).await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(
                "proxy: upstream fetch failed, route={}, error={}",
                ctx.binding, e
            );
            ctx.finalize_metrics(StatusCode::BAD_GATEWAY.as_u16());
            return Err(e);
        }
    };

    let resp = match transform_response(
        upstream_resp,
        &matched.mount,
        &cfg,
        origin.as_ref(),
        user_agent.as_deref(),
        &preload_targets,
    )
    .await
    {
        Ok(resp) => resp,
        Err(e) => {
            ctx.finalize_metrics(StatusCode::BAD_GATEWAY.as_u16());
            return Err(e);
        }
    };

    phase_log(&ctx, resp.status().as_u16());
    ctx.finalize_metrics(resp.status().as_u16());
    Ok(resp)
}

/// The path forwarded upstream: `/` when the incoming path is exactly the
/// mount, otherwise the path with the mount prefix stripped.
fn forward_path(path: &str, mount: &str) -> String {
    if mount == "/" {
        return path.to_string();
    }
    if path == mount {
        return "/".to_string();
    }
    match path.strip_prefix(mount) {
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        _ => path.to_string(),
    }
}

fn forward_request(
    req: Request<BoxBody>,
    forward_path: &str,
) -> Result<Request<BoxBody>, GatewayError> {
    let (mut parts, body) = req.into_parts();
    let path_and_query = match parts.uri.query() {
        Some(q) => format!("{}?{}", forward_path, q),
        None => forward_path.to_string(),
    };
    parts.uri = path_and_query
        .parse::<Uri>()
        .map_err(|e| GatewayError::Internal(format!("failed to build forward uri: {}", e)))?;
    Ok(Request::from_parts(parts, body))
}

/// The incoming request origin, used to resolve `Location` headers.
fn request_origin(req: &Request<BoxBody>) -> Option<Url> {
    let scheme = req
        .uri()
        .scheme_str()
        .or_else(|| {
            req.headers()
                .get("x-forwarded-proto")
                .and_then(|v| v.to_str().ok())
        })
        .unwrap_or("http");
    let authority = req
        .uri()
        .authority()
        .map(|a| a.as_str().to_string())
        .or_else(|| {
            req.headers()
                .get(HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        })?;
    Url::parse(&format!("{}://{}", scheme, authority)).ok()
}

async fn transform_response(
    resp: Response<BoxBody>,
    mount: &str,
    cfg: &RequestConfig,
    origin: Option<&Url>,
    user_agent: Option<&str>,
    preload_targets: &[String],
) -> Result<Response<BoxBody>, GatewayError> {
    let status = resp.status();

    if status.is_redirection() {
        let (parts, _body) = resp.into_parts();
        let mut headers = parts.headers;
        if let Some(origin) = origin {
            rewrite_location(&mut headers, origin, mount);
        }
        rewrite_set_cookie(&mut headers, mount);
        metrics::counter!("mosaic_rewrite_total", "kind" => "redirect").increment(1);

        let mut out = Response::new(empty_body());
        *out.status_mut() = status;
        *out.headers_mut() = headers;
        return Ok(out);
    }

    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if content_type.contains("text/html") {
        let (parts, body) = resp.into_parts();
        let text = read_text(body).await?;
        let mut headers = parts.headers;
        strip_entity_headers(&mut headers);
        rewrite_set_cookie(&mut headers, mount);

        let opts = HtmlRewriteOptions {
            mount,
            assets: &cfg.assets,
            smooth_transitions: cfg.options.smooth_transitions,
            preload_targets,
            chromium: user_agent.map(preload::is_chromium).unwrap_or(false),
        };
        let rewritten = match rewrite_html(&text, &opts) {
            Ok(out) => out,
            Err(e) => {
                warn!("rewrite: html transform failed, mount={}, error={}", mount, e);
                text
            }
        };
        metrics::counter!("mosaic_rewrite_total", "kind" => "html").increment(1);

        let mut out = Response::new(full_body(rewritten));
        *out.status_mut() = parts.status;
        *out.headers_mut() = headers;
        return Ok(out);
    }

    if content_type.contains("text/css") {
        let (parts, body) = resp.into_parts();
        let text = read_text(body).await?;
        let mut headers = parts.headers;
        strip_entity_headers(&mut headers);
        rewrite_set_cookie(&mut headers, mount);

        let rewritten = rewrite_css(&text, mount, &cfg.assets);
        metrics::counter!("mosaic_rewrite_total", "kind" => "css").increment(1);

        let mut out = Response::new(full_body(rewritten));
        *out.status_mut() = parts.status;
        *out.headers_mut() = headers;
        return Ok(out);
    }

    // Anything else streams through untouched apart from cookie scoping.
    let (mut parts, body) = resp.into_parts();
    rewrite_set_cookie(&mut parts.headers, mount);
    Ok(Response::from_parts(parts, body))
}

async fn read_text(body: BoxBody) -> Result<String, GatewayError> {
    let bytes = body
        .collect()
        .await
        .map_err(|e| GatewayError::Upstream(format!("failed to read upstream body: {}", e)))?
        .to_bytes();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn strip_entity_headers(headers: &mut HeaderMap) {
    headers.remove(CONTENT_LENGTH);
    headers.remove(ETAG);
    headers.remove(CONTENT_ENCODING);
}

fn phase_log(ctx: &RequestContext, status: u16) {
    tracing::info!(
        method = %ctx.method,
        host = %ctx.host,
        path = %ctx.uri_path,
        status = status,
        route = %ctx.binding,
        mount = %ctx.mount,
        latency_ms = %ctx.start.elapsed().as_millis(),
        "access"
    );
}
