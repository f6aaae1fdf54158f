//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ingress_requests_total` (counter): dispatched requests by method, status
//! - `ingress_request_duration_seconds` (histogram): latency distribution
//! - `ingress_rejections_total` (counter): ingress short-circuits by reason
//! - `ingress_telemetry_dropped_total` (counter): records lost at the sink
//! - `ingress_lifecycle_state` (gauge): 0=initializing 1=ready 2=degraded 3=failed
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::lifecycle::state::LifecycleState;

pub const REQUESTS_TOTAL: &str = "ingress_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "ingress_request_duration_seconds";
pub const REJECTIONS_TOTAL: &str = "ingress_rejections_total";
pub const TELEMETRY_DROPPED_TOTAL: &str = "ingress_telemetry_dropped_total";
pub const LIFECYCLE_STATE: &str = "ingress_lifecycle_state";

/// Install the Prometheus recorder with a scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, latency: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    counter!(REQUESTS_TOTAL, &labels).increment(1);
    histogram!(REQUEST_DURATION_SECONDS, &labels).record(latency.as_secs_f64());
}

pub fn record_rejection(reason: &'static str) {
    counter!(REJECTIONS_TOTAL, "reason" => reason).increment(1);
}

pub fn record_telemetry_dropped(reason: &'static str) {
    counter!(TELEMETRY_DROPPED_TOTAL, "reason" => reason).increment(1);
}

pub fn record_lifecycle_state(state: LifecycleState) {
    gauge!(LIFECYCLE_STATE).set(state.as_gauge());
}
