//! Metrics collection and export for Huddle.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format. Hub-level counters are recorded by
//! `huddle-core` and described here.

use huddle_core::hub::names as hub_names;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "huddle_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "huddle_connections_active";
    pub const JOINS_REJECTED_TOTAL: &str = "huddle_joins_rejected_total";
    pub const DEPARTURES_TOTAL: &str = "huddle_departures_total";
    pub const ROOMS_ACTIVE: &str = "huddle_rooms_active";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of upgraded WebSocket connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of open WebSocket connections"
    );
    metrics::describe_counter!(
        names::JOINS_REJECTED_TOTAL,
        "Join attempts refused, by reason"
    );
    metrics::describe_counter!(
        names::DEPARTURES_TOTAL,
        "Connections that ended, by reason"
    );
    metrics::describe_gauge!(names::ROOMS_ACTIVE, "Current number of rooms");

    metrics::describe_counter!(
        hub_names::BROADCASTS_TOTAL,
        "Messages fanned out to a room"
    );
    metrics::describe_counter!(
        hub_names::BROADCASTS_DROPPED,
        "Broadcasts addressed to a room that does not exist"
    );
    metrics::describe_counter!(
        hub_names::DELIVERIES_TOTAL,
        "Messages enqueued into member mailboxes"
    );
    metrics::describe_counter!(
        hub_names::EVICTIONS_TOTAL,
        "Members disconnected because their mailbox was full"
    );

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a new connection.
pub fn record_connection() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a disconnection.
pub fn record_disconnection() {
    gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a join refused before or after the upgrade.
pub fn record_join_rejected(reason: &'static str) {
    counter!(names::JOINS_REJECTED_TOTAL, "reason" => reason).increment(1);
}

/// Record why a connection ended.
pub fn record_departure(reason: &'static str) {
    counter!(names::DEPARTURES_TOTAL, "reason" => reason).increment(1);
}

/// Update the room count.
pub fn set_active_rooms(count: usize) {
    gauge!(names::ROOMS_ACTIVE).set(count as f64);
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        record_connection();
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        record_disconnection();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_guard() {
        // No recorder installed; recording is a no-op.
        let _guard = ConnectionMetricsGuard::new();
        record_join_rejected("room_not_found");
        record_departure("left");
        set_active_rooms(3);
    }
}
