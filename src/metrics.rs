//! Prometheus metrics for gateway observability.
//!
//! Metrics are exposed via a dedicated HTTP listener (default: `0.0.0.0:9090`).
//!
//! # Available Metrics
//!
//! ## Counters
//! - `gateway_auth_requests_total` - Requests seen by the identity layer
//!   (label: `outcome` = `forwarded` | `exempt` | `rejected`)
//! - `gateway_auth_rejections_total` - Rejections by category (label: `reason`)
//! - `gateway_upstream_requests_total` - Forwarded requests (label: `status`)
//!
//! ## Histograms
//! - `gateway_upstream_duration_seconds` - Upstream round-trip duration
//!
//! Recording functions are no-ops until [`init_metrics`] installs a recorder,
//! so tests and metrics-disabled deployments can call them freely.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const AUTH_REQUESTS_TOTAL: &str = "gateway_auth_requests_total";
    pub const AUTH_REJECTIONS_TOTAL: &str = "gateway_auth_rejections_total";
    pub const UPSTREAM_REQUESTS_TOTAL: &str = "gateway_upstream_requests_total";
    pub const UPSTREAM_DURATION_SECONDS: &str = "gateway_upstream_duration_seconds";
}

pub const OUTCOME_FORWARDED: &str = "forwarded";
pub const OUTCOME_EXEMPT: &str = "exempt";
pub const OUTCOME_REJECTED: &str = "rejected";

/// Install the Prometheus exporter and describe all metrics.
///
/// # Errors
///
/// Returns a message if the exporter cannot be installed (e.g. the port is
/// taken, or a recorder is already installed).
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::AUTH_REQUESTS_TOTAL,
        "Requests handled by the identity layer, by outcome"
    );
    describe_counter!(
        names::AUTH_REJECTIONS_TOTAL,
        "Requests rejected with 401, by failure category"
    );
    describe_counter!(
        names::UPSTREAM_REQUESTS_TOTAL,
        "Requests forwarded upstream, by response status"
    );
    describe_histogram!(
        names::UPSTREAM_DURATION_SECONDS,
        "Upstream round-trip duration in seconds"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

pub fn record_auth_outcome(outcome: &'static str) {
    counter!(names::AUTH_REQUESTS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_auth_rejection(reason: &'static str) {
    counter!(names::AUTH_REJECTIONS_TOTAL, "reason" => reason).increment(1);
}

/// Record one upstream round trip. `status` is the response code, or `error`.
pub fn record_upstream_request(status: &str, duration_secs: f64) {
    counter!(names::UPSTREAM_REQUESTS_TOTAL, "status" => status.to_string()).increment(1);
    histogram!(names::UPSTREAM_DURATION_SECONDS).record(duration_secs);
}
