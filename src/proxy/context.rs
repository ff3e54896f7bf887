use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use std::time::Instant;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

/// Per-request context carried through the proxy phases.
pub struct RequestContext {
    pub host: String,
    pub uri_path: String,
    pub method: String,
    /// Binding name of the selected route; empty until a route matches.
    pub binding: String,
    pub mount: String,
    pub start: Instant,
    pub upstream_start: Option<Instant>,
}

impl RequestContext {
    pub fn new(host: String, uri_path: String, method: String) -> Self {
        Self {
            host,
            uri_path,
            method,
            binding: String::new(),
            mount: String::new(),
            start: Instant::now(),
            upstream_start: None,
        }
    }

    /// Build an error response and record final metrics in one place.
    pub fn error_response(&self, status: StatusCode, msg: &str) -> hyper::Response<BoxBody> {
        self.finalize_metrics(status.as_u16());

        hyper::Response::builder()
            .status(status)
            .header("content-type", "text/plain; charset=utf-8")
            .body(full_body(msg.to_string()))
            .unwrap()
    }

    /// Record final request metrics.
    pub fn finalize_metrics(&self, resp_status: u16) {
        let mut buf = itoa::Buffer::new();
        let status_str = buf.format(resp_status);

        metrics::counter!(
            "mosaic_http_requests_total",
            "route" => self.binding.clone(),
            "method" => self.method.clone(),
            "status_code" => status_str.to_owned(),
        )
        .increment(1);

        metrics::histogram!(
            "mosaic_http_request_duration_seconds",
            "route" => self.binding.clone(),
        )
        .record(self.start.elapsed().as_secs_f64());

        if let Some(upstream_start) = self.upstream_start {
            metrics::histogram!(
                "mosaic_upstream_request_duration_seconds",
                "route" => self.binding.clone(),
            )
            .record(upstream_start.elapsed().as_secs_f64());
        }

        if !self.binding.is_empty() {
            metrics::gauge!(
                "mosaic_http_requests_in_flight",
                "route" => self.binding.clone(),
            )
            .decrement(1.0);
        }
    }
}
