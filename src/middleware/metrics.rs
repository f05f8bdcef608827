//! Prometheus metrics for the gateway.
//!
//! Exposes a standard `/metrics` endpoint that Prometheus can scrape.
//! Route labels come from the matched route template, so cardinality is
//! bounded by the configured webhook count.

use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use once_cell::sync::Lazy;
use prometheus::{
    opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};

use crate::middleware::authz::DenyReason;

/// Gateway metrics, registered once in the global default registry.
pub struct GatewayMetrics {
    requests_total: IntCounterVec,
    request_duration_seconds: HistogramVec,
    auth_denials_total: IntCounterVec,
    upstream_errors_total: IntCounterVec,
}

static METRICS: Lazy<GatewayMetrics> = Lazy::new(GatewayMetrics::register);

impl GatewayMetrics {
    fn register() -> Self {
        let requests_total = register_int_counter_vec!(
            opts!("hookgate_requests_total", "Total number of handled requests"),
            &["route", "status"]
        )
        .expect("failed to register hookgate_requests_total");

        let request_duration_seconds = register_histogram_vec!(
            prometheus::histogram_opts!(
                "hookgate_request_duration_seconds",
                "Request latency in seconds",
                vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
            ),
            &["route"]
        )
        .expect("failed to register hookgate_request_duration_seconds");

        let auth_denials_total = register_int_counter_vec!(
            opts!("hookgate_auth_denials_total", "Authorization denials by reason"),
            &["reason"]
        )
        .expect("failed to register hookgate_auth_denials_total");

        let upstream_errors_total = register_int_counter_vec!(
            opts!("hookgate_upstream_errors_total", "Failed forwards by route"),
            &["route"]
        )
        .expect("failed to register hookgate_upstream_errors_total");

        Self {
            requests_total,
            request_duration_seconds,
            auth_denials_total,
            upstream_errors_total,
        }
    }
}

pub fn record_denial(reason: DenyReason) {
    METRICS
        .auth_denials_total
        .with_label_values(&[reason.as_str()])
        .inc();
}

pub fn record_upstream_error(route: &str) {
    METRICS
        .upstream_errors_total
        .with_label_values(&[route])
        .inc();
}

/// Route layer: counts every routed request by template and status.
pub async fn track(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let start = Instant::now();
    let resp = next.run(req).await;

    METRICS
        .requests_total
        .with_label_values(&[route.as_str(), resp.status().as_str()])
        .inc();
    METRICS
        .request_duration_seconds
        .with_label_values(&[route.as_str()])
        .observe(start.elapsed().as_secs_f64());
    resp
}

/// Encode all registered metrics as Prometheus text format.
/// Called by the `/metrics` HTTP handler.
pub fn encode_metrics() -> String {
    Lazy::force(&METRICS);
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap_or_default();
    String::from_utf8(buffer).unwrap_or_default()
}
