//! Metrics collection and exposition.
//!
//! # Metrics
//! - `authgate_decisions_total` (counter): decisions by outcome and status
//!
//! Updates are atomic increments; the Prometheus exporter runs on its own
//! listener so the decision endpoint never serves scrapes.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exporter. Failures are logged, not fatal; the
/// service keeps deciding without metrics.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics exporter started"),
        Err(e) => tracing::error!(error = %e, "failed to start metrics exporter"),
    }
}

/// Count one decision by its response status.
pub fn record_decision(status: axum::http::StatusCode) {
    let outcome = if status.is_success() { "allow" } else { "deny" };
    metrics::counter!(
        "authgate_decisions_total",
        "outcome" => outcome,
        "status" => status.as_u16().to_string()
    )
    .increment(1);
}
