mod admin;
pub mod bootstrap;
mod state;

pub use state::HostState;

use crate::proxy;
use crate::proxy::context::{full_body, BoxBody};
use anyhow::Result;
use http::header::HOST;
use http::{HeaderName, HeaderValue, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info};

/// Run the front-door server with graceful shutdown support.
///
/// When `shutdown` is notified the server stops accepting new connections
/// and waits up to `DRAIN_TIMEOUT` for in-flight connections to complete
/// before returning.
pub async fn run_proxy_server(
    listen: &str,
    state: HostState,
    shutdown: Arc<Notify>,
) -> Result<()> {
    const DRAIN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

    let addr: SocketAddr = listen.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("server: proxy listening, addr={}", addr);

    let active_conns = Arc::new(AtomicI64::new(0));

    loop {
        let accepted = tokio::select! {
            result = listener.accept() => result,
            _ = shutdown.notified() => {
                info!("server: proxy: stop accepting new connections, draining...");
                break;
            }
        };

        let (stream, peer_addr) = match accepted {
            Ok(conn) => {
                metrics::counter!("mosaic_connections_total", "status" => "accepted").increment(1);
                conn
            }
            Err(e) => {
                error!("server: proxy: accept failed, error={}", e);
                metrics::counter!("mosaic_connections_total", "status" => "error").increment(1);
                continue;
            }
        };

        metrics::gauge!("mosaic_connections_active").increment(1.0);
        active_conns.fetch_add(1, Ordering::Relaxed);

        let state = state.clone();
        let active_conns = active_conns.clone();

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let state_inner = state.clone();
            let svc = service_fn(move |req: Request<Incoming>| {
                let state = state_inner.clone();
                async move { serve_request(req, state, peer_addr).await }
            });

            if let Err(e) = auto::Builder::new(TokioExecutor::new())
                .http1()
                .keep_alive(true)
                .http2()
                .keep_alive_interval(Some(std::time::Duration::from_secs(20)))
                .serve_connection_with_upgrades(io, svc)
                .await
            {
                if !e.to_string().contains("connection closed") {
                    error!(
                        "server: proxy: connection error, peer={}, error={}",
                        peer_addr, e
                    );
                }
            }

            metrics::gauge!("mosaic_connections_active").decrement(1.0);
            active_conns.fetch_sub(1, Ordering::Relaxed);
        });
    }

    // Drain phase: wait for in-flight connections to finish (or timeout).
    let active = active_conns.load(Ordering::Relaxed);
    if active > 0 {
        info!("server: proxy: waiting for {} active connections", active);
        let drain = async {
            while active_conns.load(Ordering::Relaxed) > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        };
        match tokio::time::timeout(DRAIN_TIMEOUT, drain).await {
            Ok(_) => info!("server: proxy: all connections drained"),
            Err(_) => info!(
                "server: proxy: drain timeout ({}s), {} connections still active",
                DRAIN_TIMEOUT.as_secs(),
                active_conns.load(Ordering::Relaxed)
            ),
        }
    }

    Ok(())
}

/// Bridge one hyper request into the router: box the body, stamp the
/// forwarded headers, hand the per-request environment to `handle`.
async fn serve_request(
    req: Request<Incoming>,
    state: HostState,
    peer_addr: SocketAddr,
) -> Result<Response<BoxBody>, hyper::Error> {
    let mut req = req.map(|body| body.boxed());

    let host = req
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    inject_forwarded_headers(req.headers_mut(), peer_addr, &host);

    let env = state.request_env();
    match proxy::handle(req, &env).await {
        Ok(resp) => Ok(resp),
        Err(e) => {
            error!("proxy: request failed, error={}", e);
            Ok(Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .header("content-type", "application/json")
                .body(full_body(format!(r#"{{"error":"{}"}}"#, e)))
                .unwrap())
        }
    }
}

/// Inject standard `X-Forwarded-*` and `X-Real-IP` headers so sub-workers
/// can identify the original client and protocol.
fn inject_forwarded_headers(
    headers: &mut http::HeaderMap,
    peer_addr: SocketAddr,
    original_host: &str,
) {
    static XFF: HeaderName = HeaderName::from_static("x-forwarded-for");
    static XFP: HeaderName = HeaderName::from_static("x-forwarded-proto");
    static XFH: HeaderName = HeaderName::from_static("x-forwarded-host");
    static XRI: HeaderName = HeaderName::from_static("x-real-ip");

    let peer_ip = peer_addr.ip().to_string();

    // X-Forwarded-For: append the peer IP to any existing list.
    if let Some(existing) = headers.get(&XFF).and_then(|v| v.to_str().ok()) {
        let mut combined = String::with_capacity(existing.len() + 2 + peer_ip.len());
        combined.push_str(existing);
        combined.push_str(", ");
        combined.push_str(&peer_ip);
        if let Ok(value) = HeaderValue::from_str(&combined) {
            headers.insert(XFF.clone(), value);
        }
    } else if let Ok(value) = HeaderValue::from_str(&peer_ip) {
        headers.insert(XFF.clone(), value);
    }

    // X-Forwarded-Proto: trust an incoming value (e.g. from a TLS-terminating
    // balancer), default to http when absent.
    if !headers.contains_key(&XFP) {
        headers.insert(XFP.clone(), HeaderValue::from_static("http"));
    }

    if !original_host.is_empty() {
        if let Ok(value) = HeaderValue::from_str(original_host) {
            headers.insert(XFH.clone(), value);
        }
    }

    if let Ok(value) = HeaderValue::from_str(&peer_ip) {
        headers.insert(XRI.clone(), value);
    }
}

/// Run the admin server for health/readiness checks and metrics.
pub async fn run_admin_server(listen: &str, state: HostState) -> Result<()> {
    let addr: SocketAddr = listen.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("server: admin listening, addr={}", addr);

    loop {
        let (stream, _) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let svc = service_fn(move |req: Request<Incoming>| {
                let state = state.clone();
                async move { admin::handle_admin(req, state) }
            });

            if let Err(e) = auto::Builder::new(TokioExecutor::new())
                .http1()
                .keep_alive(true)
                .serve_connection_with_upgrades(io, svc)
                .await
            {
                if !e.to_string().contains("connection closed") {
                    error!("server: admin: connection error, error={}", e);
                }
            }
        });
    }
}
