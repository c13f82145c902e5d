//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_client_connections_created_total` (counter): connections dialled, by route
//! - `http_client_connections_reused_total` (counter): checkouts served from the idle set, by route
//! - `http_client_connections_closed_total` (counter): connections closed for any reason
//! - `http_client_pool_exhausted_total` (counter): acquires that timed out, by route
//! - `http_client_retries_total` (counter): retries, by fault kind
//! - `http_client_requests_total` (counter): finished requests, by outcome
//! - `http_client_pool_leased` / `http_client_pool_idle` (gauges): pool occupancy
//!
//! # Design Decisions
//! - Recording without an installed recorder is a no-op, so library users
//!   who do not call [`install_exporter`] pay nothing
//! - Labels are bounded: routes, fault kinds and a fixed outcome set

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::error::{ClientError, FaultKind};
use crate::pool::{PoolStats, Route};

/// Start the Prometheus scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn install_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe();
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn describe() {
    ::metrics::describe_counter!("http_client_connections_created_total", "Connections dialled");
    ::metrics::describe_counter!("http_client_connections_reused_total", "Checkouts served from idle connections");
    ::metrics::describe_counter!("http_client_connections_closed_total", "Connections closed");
    ::metrics::describe_counter!("http_client_pool_exhausted_total", "Acquires that timed out waiting for a slot");
    ::metrics::describe_counter!("http_client_retries_total", "Requests retried after a transport fault");
    ::metrics::describe_counter!("http_client_requests_total", "Requests finished");
    ::metrics::describe_gauge!("http_client_pool_leased", "Connections currently leased");
    ::metrics::describe_gauge!("http_client_pool_idle", "Idle pooled connections");
}

pub fn connection_created(route: &Route) {
    ::metrics::counter!("http_client_connections_created_total", "route" => route.to_string()).increment(1);
}

pub fn connection_reused(route: &Route) {
    ::metrics::counter!("http_client_connections_reused_total", "route" => route.to_string()).increment(1);
}

pub fn connections_closed(n: usize) {
    if n > 0 {
        ::metrics::counter!("http_client_connections_closed_total").increment(n as u64);
    }
}

pub fn pool_exhausted(route: &Route) {
    ::metrics::counter!("http_client_pool_exhausted_total", "route" => route.to_string()).increment(1);
}

pub fn pool_gauges(stats: &PoolStats) {
    ::metrics::gauge!("http_client_pool_leased").set(stats.leased as f64);
    ::metrics::gauge!("http_client_pool_idle").set(stats.idle as f64);
}

pub fn retry(kind: FaultKind) {
    ::metrics::counter!("http_client_retries_total", "fault" => kind.as_str()).increment(1);
}

pub fn request_succeeded() {
    ::metrics::counter!("http_client_requests_total", "outcome" => "success").increment(1);
}

pub fn request_failed(error: &ClientError) {
    ::metrics::counter!("http_client_requests_total", "outcome" => outcome(error)).increment(1);
}

fn outcome(error: &ClientError) -> &'static str {
    match error {
        ClientError::PoolExhausted { .. } => "pool_exhausted",
        ClientError::PoolClosed => "pool_closed",
        ClientError::Transport(_) => "transport_fault",
        ClientError::RetryExhausted { .. } => "retry_exhausted",
        ClientError::InvalidRequest(_) => "invalid_request",
    }
}
