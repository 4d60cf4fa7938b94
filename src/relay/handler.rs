use std::sync::Arc;
use std::time::Instant;

use tokio::time::timeout;

use crate::connection_manager::{
    ChannelRegistry, ConnectionHandle, ConnectionSource, InboundFrame, TransportError,
};
use crate::metrics::{ConnectionMetrics, FrameMetrics};
use crate::shutdown::{ShutdownListener, ShutdownSignal};

use super::broadcaster::Broadcaster;

/// Why a relay loop ended
#[derive(Debug, Clone)]
pub enum CloseReason {
    /// The remote end closed the connection or the stream ended
    RemoteClosed,
    /// Reading from the connection failed
    TransportError(TransportError),
    /// The process is shutting down
    Shutdown,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RemoteClosed => "remote_closed",
            Self::TransportError(_) => "transport_error",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Drives one connection from registration to deregistration.
///
/// The membership guard taken in [`ConnectionHandler::run`] is released on
/// every exit path, including the future being dropped mid-loop.
#[derive(Clone)]
pub struct ConnectionHandler {
    registry: Arc<ChannelRegistry>,
    broadcaster: Arc<Broadcaster>,
    shutdown: ShutdownSignal,
}

impl ConnectionHandler {
    pub fn new(
        registry: Arc<ChannelRegistry>,
        broadcaster: Arc<Broadcaster>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            shutdown,
        }
    }

    /// Register `handle`, relay its binary frames to its channel until it
    /// closes, then unregister it.
    #[tracing::instrument(
        name = "relay.connection",
        skip_all,
        fields(
            connection_id = %handle.id,
            channel = %handle.channel()
        )
    )]
    pub async fn run<S>(&self, handle: Arc<ConnectionHandle>, mut source: S) -> CloseReason
    where
        S: ConnectionSource,
    {
        let started = Instant::now();
        let mut shutdown = self.shutdown.subscribe();

        let membership = self.registry.join(handle.clone());
        ConnectionMetrics::record_opened();

        tracing::info!(
            connection_id = %handle.id,
            channel = %handle.channel(),
            members = self.registry.member_count(handle.channel().as_str()),
            "Connection joined channel"
        );

        let reason = self.relay(&handle, &mut source, &mut shutdown).await;

        drop(membership);
        // A peer that stopped reading can block the close handshake indefinitely
        if timeout(self.broadcaster.send_timeout(), handle.close())
            .await
            .is_err()
        {
            tracing::warn!(
                connection_id = %handle.id,
                "Timed out closing connection"
            );
        }

        let duration = started.elapsed().as_secs_f64();
        ConnectionMetrics::record_closed(reason.as_str(), duration);

        tracing::info!(
            connection_id = %handle.id,
            channel = %handle.channel(),
            reason = reason.as_str(),
            duration_secs = duration,
            "Connection left channel"
        );

        reason
    }

    async fn relay<S>(
        &self,
        handle: &ConnectionHandle,
        source: &mut S,
        shutdown: &mut ShutdownListener,
    ) -> CloseReason
    where
        S: ConnectionSource,
    {
        loop {
            let next = tokio::select! {
                _ = shutdown.wait() => return CloseReason::Shutdown,
                next = source.recv() => next,
            };

            match next {
                Some(Ok(InboundFrame::Binary(payload))) => {
                    FrameMetrics::record_received("binary");
                    let broadcast = self
                        .broadcaster
                        .broadcast(handle.channel().as_str(), payload);
                    let outcome = tokio::select! {
                        _ = shutdown.wait() => return CloseReason::Shutdown,
                        outcome = broadcast => outcome,
                    };

                    if outcome.failed > 0 || outcome.timed_out > 0 {
                        tracing::debug!(
                            connection_id = %handle.id,
                            recipients = outcome.recipients,
                            failed = outcome.failed,
                            timed_out = outcome.timed_out,
                            "Broadcast had undelivered recipients"
                        );
                    }
                }
                Some(Ok(frame)) => {
                    FrameMetrics::record_received(frame.kind());
                    tracing::trace!(
                        connection_id = %handle.id,
                        kind = frame.kind(),
                        "Ignoring non-binary frame"
                    );
                }
                Some(Err(e)) => {
                    tracing::warn!(
                        connection_id = %handle.id,
                        error = %e,
                        "Connection receive error"
                    );
                    return CloseReason::TransportError(e);
                }
                None => return CloseReason::RemoteClosed,
            }
        }
    }
}
