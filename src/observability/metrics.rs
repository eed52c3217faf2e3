//! Metrics collection and exposition.
//!
//! # Metrics
//! - `<prefix>_requests_total` (counter): requests by method and outcome
//! - `<prefix>_request_response_time_seconds` (histogram): send + receive
//! - `<prefix>_request_decode_time_seconds` (histogram): body decoding
//! - `<prefix>_request_total_time_seconds` (histogram): whole dispatch
//! - `<prefix>_pool_wait_seconds` (histogram): time spent waiting for a connection
//! - `<prefix>_pool_timeouts_total` (counter)
//! - `<prefix>_pool_connections` (gauge): by state (idle, checked_out)
//! - `<prefix>_connections_opened_total` / `<prefix>_connections_closed_total` (counters)
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed recorder it is a no-op
//! - The Prometheus exporter is opt-in via `init_metrics`

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one dispatched request.
pub fn record_request(
    prefix: &str,
    method: &'static str,
    outcome: &'static str,
    response_time: Duration,
    decode_time: Duration,
    total_time: Duration,
) {
    counter!(format!("{}_requests_total", prefix), "method" => method, "outcome" => outcome).increment(1);
    histogram!(format!("{}_request_response_time_seconds", prefix), "method" => method)
        .record(response_time.as_secs_f64());
    histogram!(format!("{}_request_decode_time_seconds", prefix), "method" => method)
        .record(decode_time.as_secs_f64());
    histogram!(format!("{}_request_total_time_seconds", prefix), "method" => method)
        .record(total_time.as_secs_f64());
}

/// Record how long a caller waited for a pooled connection.
pub fn record_pool_wait(prefix: &str, wait: Duration) {
    histogram!(format!("{}_pool_wait_seconds", prefix)).record(wait.as_secs_f64());
}

pub fn record_pool_timeout(prefix: &str) {
    counter!(format!("{}_pool_timeouts_total", prefix)).increment(1);
}

/// Update pool occupancy gauges.
pub fn record_pool_connections(prefix: &str, idle: usize, checked_out: usize) {
    gauge!(format!("{}_pool_connections", prefix), "state" => "idle").set(idle as f64);
    gauge!(format!("{}_pool_connections", prefix), "state" => "checked_out").set(checked_out as f64);
}

pub fn record_connection_opened(prefix: &str) {
    counter!(format!("{}_connections_opened_total", prefix)).increment(1);
}

pub fn record_connection_closed(prefix: &str, reason: &'static str) {
    counter!(format!("{}_connections_closed_total", prefix), "reason" => reason).increment(1);
}
