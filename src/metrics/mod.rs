//! Prometheus metrics for the relay.
//!
//! - Connection metrics (active connections, channels, lifetimes)
//! - Broadcast metrics (fan-out size, latency, per-recipient outcome)
//! - Inbound frame metrics

mod helpers;

pub use helpers::{encode_metrics, BroadcastMetrics, ConnectionMetrics, FrameMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "relay";

lazy_static! {
    // ============================================================================
    // Connection Metrics
    // ============================================================================

    /// Connections currently registered in a channel
    pub static ref CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_connections_active", METRIC_PREFIX),
        "Number of connections currently registered in a channel"
    ).unwrap();

    /// Channels with at least one member
    pub static ref CHANNELS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_channels_active", METRIC_PREFIX),
        "Number of channels with at least one member"
    ).unwrap();

    /// Connections opened
    pub static ref CONNECTIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_connections_opened_total", METRIC_PREFIX),
        "Total connections opened"
    ).unwrap();

    /// Connections closed, by close reason
    pub static ref CONNECTIONS_CLOSED: IntCounterVec = register_int_counter_vec!(
        format!("{}_connections_closed_total", METRIC_PREFIX),
        "Total connections closed",
        &["reason"]
    ).unwrap();

    /// Failed websocket upgrades
    pub static ref UPGRADES_FAILED: IntCounter = register_int_counter!(
        format!("{}_upgrades_failed_total", METRIC_PREFIX),
        "Total websocket upgrades that failed"
    ).unwrap();

    /// Connection lifetime
    pub static ref CONNECTION_DURATION: Histogram = register_histogram!(
        format!("{}_connection_duration_seconds", METRIC_PREFIX),
        "Connection duration in seconds",
        vec![1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0, 1800.0, 3600.0]
    ).unwrap();

    // ============================================================================
    // Broadcast Metrics
    // ============================================================================

    /// Broadcasts started
    pub static ref BROADCASTS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_broadcasts_total", METRIC_PREFIX),
        "Total broadcasts"
    ).unwrap();

    /// Per-recipient delivery outcomes
    pub static ref DELIVERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_deliveries_total", METRIC_PREFIX),
        "Total per-recipient deliveries by outcome",
        &["outcome"]
    ).unwrap();

    /// Bytes handed to recipients
    pub static ref DELIVERED_BYTES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_delivered_bytes_total", METRIC_PREFIX),
        "Total payload bytes delivered to recipients"
    ).unwrap();

    /// Recipients per broadcast
    pub static ref BROADCAST_FANOUT: Histogram = register_histogram!(
        format!("{}_broadcast_fanout", METRIC_PREFIX),
        "Number of recipients per broadcast",
        vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 500.0, 1000.0]
    ).unwrap();

    /// Time until every recipient of a broadcast completed
    pub static ref BROADCAST_LATENCY: Histogram = register_histogram!(
        format!("{}_broadcast_latency_seconds", METRIC_PREFIX),
        "Broadcast latency in seconds",
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    ).unwrap();

    // ============================================================================
    // Frame Metrics
    // ============================================================================

    /// Inbound frames by kind
    pub static ref FRAMES_RECEIVED: IntCounterVec = register_int_counter_vec!(
        format!("{}_frames_received_total", METRIC_PREFIX),
        "Total inbound frames by kind",
        &["kind"]
    ).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics() {
        // lazy_static registers on first access
        CONNECTIONS_ACTIVE.set(1);

        let output = encode_metrics().unwrap();
        assert!(output.contains("relay_connections_active"));
    }

    #[test]
    fn test_connection_metrics() {
        CONNECTIONS_ACTIVE.set(10);
        CHANNELS_ACTIVE.set(2);
        CONNECTIONS_OPENED.inc();
        CONNECTION_DURATION.observe(3.0);
    }
}
