//! Metrics collection and exposition.
//!
//! # Metrics
//! - `graphql_requests_total` (counter): requests by result kind and status
//! - `graphql_request_duration_seconds` (histogram): time to first byte
//! - `graphql_websocket_connections` (gauge): open websocket clients by protocol
//! - `graphql_websocket_rejected_total` (counter): upgrades refused
//! - `graphql_codegen_runs_total` (counter): codegen outcomes
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - The Prometheus exporter owns its own listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(address: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(address).install() {
        Ok(()) => tracing::info!(address = %address, "Metrics exporter listening"),
        Err(error) => tracing::error!(error = %error, "Failed to install metrics exporter"),
    }
}

pub fn record_request(kind: &'static str, status: u16, start: Instant) {
    counter!("graphql_requests_total", "kind" => kind, "status" => status.to_string()).increment(1);
    histogram!("graphql_request_duration_seconds", "kind" => kind).record(start.elapsed().as_secs_f64());
}

pub fn record_ws_connected(protocol: &'static str) {
    gauge!("graphql_websocket_connections", "protocol" => protocol).increment(1.0);
}

pub fn record_ws_disconnected(protocol: &'static str) {
    gauge!("graphql_websocket_connections", "protocol" => protocol).decrement(1.0);
}

pub fn record_ws_rejected(reason: &'static str) {
    counter!("graphql_websocket_rejected_total", "reason" => reason).increment(1);
}

pub fn record_codegen(outcome: &'static str) {
    counter!("graphql_codegen_runs_total", "outcome" => outcome).increment(1);
}
