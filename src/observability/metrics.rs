//! Metrics collection and exposition.
//!
//! # Metrics
//! - `frontend-requests` (counter): accepted client connections, by app
//! - `frontend_backends` (gauge): current backend count, by app
//! - `frontend_active_relays` (gauge): relays in flight, by app
//! - `relay_bytes_total` (counter): bytes relayed, by app and direction
//! - `relay_failures_total` (counter): relays that never reached a backend
//! - `discovery_commands_total` (counter): commands emitted, by kind
//!
//! # Design Decisions
//! - Call sites only record; exposition is a Prometheus HTTP listener
//! - Recording without an installed recorder is a no-op, so tests need no setup

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Counter incremented once per accepted frontend connection.
pub const FRONTEND_REQUESTS: &str = "frontend-requests";

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_frontend_request(app_id: &str) {
    counter!(FRONTEND_REQUESTS, "app" => app_id.to_string()).increment(1);
}

pub fn record_backend_count(app_id: &str, count: usize) {
    gauge!("frontend_backends", "app" => app_id.to_string()).set(count as f64);
}

pub fn record_active_relays(app_id: &str, count: u64) {
    gauge!("frontend_active_relays", "app" => app_id.to_string()).set(count as f64);
}

pub fn record_relay_bytes(app_id: &str, to_backend: u64, to_client: u64) {
    counter!("relay_bytes_total", "app" => app_id.to_string(), "direction" => "upstream")
        .increment(to_backend);
    counter!("relay_bytes_total", "app" => app_id.to_string(), "direction" => "downstream")
        .increment(to_client);
}

pub fn record_relay_failure(app_id: &str, reason: &'static str) {
    counter!("relay_failures_total", "app" => app_id.to_string(), "reason" => reason).increment(1);
}

pub fn record_discovery_command(kind: &'static str) {
    counter!("discovery_commands_total", "kind" => kind).increment(1);
}
