//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    BROADCASTS_TOTAL, BROADCAST_FANOUT, BROADCAST_LATENCY, CHANNELS_ACTIVE, CONNECTIONS_ACTIVE,
    CONNECTIONS_CLOSED, CONNECTIONS_OPENED, CONNECTION_DURATION, DELIVERED_BYTES_TOTAL,
    DELIVERIES_TOTAL, FRAMES_RECEIVED, UPGRADES_FAILED,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording connection lifecycle metrics
pub struct ConnectionMetrics;

impl ConnectionMetrics {
    pub fn record_opened() {
        CONNECTIONS_OPENED.inc();
    }

    pub fn record_closed(reason: &str, duration_secs: f64) {
        CONNECTIONS_CLOSED.with_label_values(&[reason]).inc();
        CONNECTION_DURATION.observe(duration_secs);
    }

    pub fn record_upgrade_failed() {
        UPGRADES_FAILED.inc();
    }

    /// Refresh gauges from registry counts
    pub fn set_active(connections: usize, channels: usize) {
        CONNECTIONS_ACTIVE.set(connections as i64);
        CHANNELS_ACTIVE.set(channels as i64);
    }
}

/// Helper struct for recording broadcast metrics
pub struct BroadcastMetrics;

impl BroadcastMetrics {
    pub fn record_broadcast(recipients: usize, latency_secs: f64) {
        BROADCASTS_TOTAL.inc();
        BROADCAST_FANOUT.observe(recipients as f64);
        BROADCAST_LATENCY.observe(latency_secs);
    }

    pub fn record_delivered(count: u64, bytes: u64) {
        DELIVERIES_TOTAL.with_label_values(&["delivered"]).inc_by(count);
        DELIVERED_BYTES_TOTAL.inc_by(bytes);
    }

    pub fn record_failed(count: u64) {
        DELIVERIES_TOTAL.with_label_values(&["failed"]).inc_by(count);
    }

    pub fn record_timed_out(count: u64) {
        DELIVERIES_TOTAL.with_label_values(&["timeout"]).inc_by(count);
    }
}

/// Helper struct for recording inbound frames
pub struct FrameMetrics;

impl FrameMetrics {
    pub fn record_received(kind: &str) {
        FRAMES_RECEIVED.with_label_values(&[kind]).inc();
    }
}
