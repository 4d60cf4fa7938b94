//! Graceful shutdown handling.
//!
//! On SIGINT/SIGTERM the HTTP listener stops accepting, every relay loop is
//! told to close through [`ShutdownSignal`], and the process waits a bounded
//! time for the channel registry to drain.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::signal;
use tokio::sync::watch;
use tokio::time::timeout;

use crate::connection_manager::ChannelRegistry;

/// Process-wide shutdown flag observed by every relay loop
#[derive(Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signal shutdown. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Listener that also fires if shutdown was triggered before subscribing
    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Resolves once shutdown has been triggered
    pub async fn wait(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Sender gone: shutdown can no longer be signalled
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Result of a graceful shutdown
#[derive(Debug, Clone, Default)]
pub struct ShutdownResult {
    pub connections_at_start: usize,
    pub connections_remaining: usize,
    pub duration: Duration,
}

/// Wait for SIGINT or SIGTERM
pub async fn wait_for_os_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}

/// Trigger shutdown and wait up to `drain_timeout` for every connection to
/// leave its channel.
#[tracing::instrument(
    name = "graceful_shutdown",
    skip(signal, registry),
    fields(total_connections = registry.connection_count())
)]
pub async fn drain_connections(
    signal: &ShutdownSignal,
    registry: &ChannelRegistry,
    drain_timeout: Duration,
) -> ShutdownResult {
    let start = Instant::now();
    let connections_at_start = registry.connection_count();

    signal.trigger();

    if connections_at_start > 0 {
        tracing::info!(
            connections = connections_at_start,
            "Waiting for connections to close"
        );

        let wait_future = async {
            while registry.connection_count() > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        let _ = timeout(drain_timeout, wait_future).await;
    }

    let result = ShutdownResult {
        connections_at_start,
        connections_remaining: registry.connection_count(),
        duration: start.elapsed(),
    };

    if result.connections_remaining > 0 {
        tracing::warn!(
            remaining = result.connections_remaining,
            timeout_secs = drain_timeout.as_secs(),
            "Drain timeout reached with connections still open"
        );
    } else {
        tracing::info!(
            closed = connections_at_start,
            duration_ms = result.duration.as_millis() as u64,
            "All connections closed"
        );
    }

    result
}
