use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Histogram bucket boundaries for latency metrics (seconds).
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Thin handle around the global metrics recorder.
///
/// After `Metrics::install()` the `metrics` crate macros (`counter!`,
/// `gauge!`, `histogram!`) can be used anywhere in the codebase. The
/// `PrometheusHandle` is retained solely for rendering `/metrics`.
#[derive(Clone)]
pub struct Metrics {
    handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and register metric
    /// descriptions. Must be called once, at startup.
    pub fn install() -> Self {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                metrics_exporter_prometheus::Matcher::Suffix("_duration_seconds".to_string()),
                LATENCY_BUCKETS,
            )
            .expect("valid matcher")
            .install_recorder()
            .expect("failed to install metrics recorder");

        describe_counter!(
            "mosaic_http_requests_total",
            Unit::Count,
            "Total HTTP requests processed"
        );
        describe_histogram!(
            "mosaic_http_request_duration_seconds",
            Unit::Seconds,
            "Total request duration from client perspective"
        );
        describe_histogram!(
            "mosaic_upstream_request_duration_seconds",
            Unit::Seconds,
            "Time spent waiting for the bound upstream service"
        );
        describe_gauge!(
            "mosaic_http_requests_in_flight",
            Unit::Count,
            "Number of requests currently being processed"
        );
        describe_counter!(
            "mosaic_rewrite_total",
            Unit::Count,
            "Responses rewritten, labeled by kind (html, css, redirect)"
        );
        describe_gauge!(
            "mosaic_connections_active",
            Unit::Count,
            "Number of active downstream connections"
        );
        describe_counter!(
            "mosaic_connections_total",
            Unit::Count,
            "Total connections accepted"
        );

        Self { handle }
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
