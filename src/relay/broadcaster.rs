use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::time::timeout;

use crate::connection_manager::{ChannelRegistry, ConnectionHandle, TransportError};
use crate::metrics::BroadcastMetrics;

/// Outcome of a single recipient's delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Delivered,
    Failed,
    TimedOut,
}

/// Result of one broadcast, for local bookkeeping only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastOutcome {
    /// Members in the snapshot taken when the broadcast started
    pub recipients: usize,
    pub delivered: usize,
    /// Recipients whose send returned an error
    pub failed: usize,
    /// Recipients whose send did not finish within the send timeout
    pub timed_out: usize,
}

/// Running broadcast counters
#[derive(Debug, Default)]
pub struct BroadcastStats {
    pub total_broadcasts: AtomicU64,
    pub total_delivered: AtomicU64,
    pub total_failed: AtomicU64,
    pub total_timed_out: AtomicU64,
    pub total_bytes: AtomicU64,
}

impl BroadcastStats {
    pub fn snapshot(&self) -> BroadcastStatsSnapshot {
        BroadcastStatsSnapshot {
            total_broadcasts: self.total_broadcasts.load(Ordering::Relaxed),
            total_delivered: self.total_delivered.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
            total_timed_out: self.total_timed_out.load(Ordering::Relaxed),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of broadcast statistics
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastStatsSnapshot {
    pub total_broadcasts: u64,
    pub total_delivered: u64,
    pub total_failed: u64,
    pub total_timed_out: u64,
    pub total_bytes: u64,
}

/// Fans payloads out to every member of a channel
pub struct Broadcaster {
    registry: Arc<ChannelRegistry>,
    send_timeout: Duration,
    stats: BroadcastStats,
}

impl Broadcaster {
    pub fn new(registry: Arc<ChannelRegistry>, send_timeout: Duration) -> Self {
        Self {
            registry,
            send_timeout,
            stats: BroadcastStats::default(),
        }
    }

    pub fn stats(&self) -> BroadcastStatsSnapshot {
        self.stats.snapshot()
    }

    /// Upper bound on any single write to a member
    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    /// Deliver `payload` to every current member of `channel`, the sender included.
    ///
    /// All sends run concurrently and this returns once each one has finished,
    /// failed or timed out. A failing recipient never affects the others.
    #[tracing::instrument(
        name = "relay.broadcast",
        skip(self, payload),
        fields(payload_len = payload.len())
    )]
    pub async fn broadcast(&self, channel: &str, payload: Bytes) -> BroadcastOutcome {
        let members = self.registry.members_of(channel);
        let start = Instant::now();

        let mut outcome = BroadcastOutcome {
            recipients: members.len(),
            ..Default::default()
        };

        let mut sends: FuturesUnordered<_> = members
            .iter()
            .map(|member| self.deliver(member, payload.clone()))
            .collect();

        while let Some(delivery) = sends.next().await {
            match delivery {
                Delivery::Delivered => outcome.delivered += 1,
                Delivery::Failed => outcome.failed += 1,
                Delivery::TimedOut => outcome.timed_out += 1,
            }
        }

        self.record(&outcome, payload.len(), start.elapsed());

        tracing::trace!(
            channel = %channel,
            recipients = outcome.recipients,
            delivered = outcome.delivered,
            failed = outcome.failed,
            timed_out = outcome.timed_out,
            "Broadcast completed"
        );

        outcome
    }

    async fn deliver(&self, member: &Arc<ConnectionHandle>, payload: Bytes) -> Delivery {
        match timeout(self.send_timeout, member.send(payload)).await {
            Ok(Ok(())) => Delivery::Delivered,
            Ok(Err(e)) => {
                tracing::debug!(
                    connection_id = %member.id,
                    error = %e,
                    "Delivery failed, connection may be gone"
                );
                Delivery::Failed
            }
            Err(_) => {
                tracing::debug!(
                    connection_id = %member.id,
                    error = %TransportError::Timeout(self.send_timeout),
                    "Delivery timed out"
                );
                Delivery::TimedOut
            }
        }
    }

    fn record(&self, outcome: &BroadcastOutcome, payload_len: usize, elapsed: Duration) {
        let bytes = (outcome.delivered * payload_len) as u64;

        self.stats.total_broadcasts.fetch_add(1, Ordering::Relaxed);
        self.stats
            .total_delivered
            .fetch_add(outcome.delivered as u64, Ordering::Relaxed);
        self.stats
            .total_failed
            .fetch_add(outcome.failed as u64, Ordering::Relaxed);
        self.stats
            .total_timed_out
            .fetch_add(outcome.timed_out as u64, Ordering::Relaxed);
        self.stats.total_bytes.fetch_add(bytes, Ordering::Relaxed);

        BroadcastMetrics::record_broadcast(outcome.recipients, elapsed.as_secs_f64());
        BroadcastMetrics::record_delivered(outcome.delivered as u64, bytes);
        BroadcastMetrics::record_failed(outcome.failed as u64);
        BroadcastMetrics::record_timed_out(outcome.timed_out as u64);
    }
}
