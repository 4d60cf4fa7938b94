//! In-process transport implementing the connection traits.
//!
//! `MemoryConnection::pair` returns the server side of a connection together
//! with a `MemoryPeer` that plays the remote client: it pushes inbound frames,
//! reads what the relay delivered, and can be told to reject or stall sends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use super::types::{ConnectionSink, ConnectionSource, InboundFrame, TransportError};

type Inbound = Result<InboundFrame, TransportError>;

#[derive(Default)]
struct PeerFlags {
    reject_sends: AtomicBool,
    stall_sends: AtomicBool,
    closed: AtomicBool,
}

/// Server side of an in-memory connection
pub struct MemoryConnection {
    sink: Arc<MemorySink>,
    source: MemorySource,
}

impl MemoryConnection {
    /// Create a connected pair. `buffer` bounds both directions.
    pub fn pair(buffer: usize) -> (Self, MemoryPeer) {
        let (inbound_tx, inbound_rx) = mpsc::channel(buffer);
        let (outbound_tx, outbound_rx) = mpsc::channel(buffer);
        let flags = Arc::new(PeerFlags::default());

        let conn = Self {
            sink: Arc::new(MemorySink {
                outbound: outbound_tx,
                flags: flags.clone(),
            }),
            source: MemorySource { inbound: inbound_rx },
        };
        let peer = MemoryPeer {
            inbound: Some(inbound_tx),
            outbound: outbound_rx,
            flags,
        };

        (conn, peer)
    }

    pub fn sink(&self) -> Arc<dyn ConnectionSink> {
        self.sink.clone()
    }

    pub fn into_parts(self) -> (Arc<dyn ConnectionSink>, MemorySource) {
        (self.sink, self.source)
    }
}

pub struct MemorySink {
    outbound: mpsc::Sender<Bytes>,
    flags: Arc<PeerFlags>,
}

#[async_trait]
impl ConnectionSink for MemorySink {
    async fn send(&self, payload: Bytes) -> Result<(), TransportError> {
        if self.flags.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        if self.flags.reject_sends.load(Ordering::Acquire) {
            return Err(TransportError::Io("peer rejected frame".to_string()));
        }
        if self.flags.stall_sends.load(Ordering::Acquire) {
            std::future::pending::<()>().await;
        }
        self.outbound
            .send(payload)
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&self) {
        if self.flags.stall_sends.load(Ordering::Acquire) {
            std::future::pending::<()>().await;
        }
        self.flags.closed.store(true, Ordering::Release);
    }
}

pub struct MemorySource {
    inbound: mpsc::Receiver<Inbound>,
}

#[async_trait]
impl ConnectionSource for MemorySource {
    async fn recv(&mut self) -> Option<Inbound> {
        self.inbound.recv().await
    }
}

/// Client side of an in-memory connection
pub struct MemoryPeer {
    inbound: Option<mpsc::Sender<Inbound>>,
    outbound: mpsc::Receiver<Bytes>,
    flags: Arc<PeerFlags>,
}

impl MemoryPeer {
    async fn push(&self, frame: Inbound) -> Result<(), TransportError> {
        match &self.inbound {
            Some(tx) => tx.send(frame).await.map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    pub async fn send_binary(&self, payload: impl Into<Bytes>) -> Result<(), TransportError> {
        self.push(Ok(InboundFrame::Binary(payload.into()))).await
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.push(Ok(InboundFrame::Text(text.into()))).await
    }

    pub async fn send_control(&self) -> Result<(), TransportError> {
        self.push(Ok(InboundFrame::Control)).await
    }

    /// Make the server side observe a transport error on its next read
    pub async fn fail(&self, reason: impl Into<String>) -> Result<(), TransportError> {
        self.push(Err(TransportError::Io(reason.into()))).await
    }

    /// Close the client side; the server side sees end of stream.
    pub fn close(&mut self) {
        self.inbound = None;
    }

    /// Reject every frame the relay tries to deliver from now on
    pub fn reject_sends(&self) {
        self.flags.reject_sends.store(true, Ordering::Release);
    }

    /// Never complete any delivery or close from now on
    pub fn stall_sends(&self) {
        self.flags.stall_sends.store(true, Ordering::Release);
    }

    /// Whether the server side closed the connection
    pub fn is_closed_by_server(&self) -> bool {
        self.flags.closed.load(Ordering::Acquire)
    }

    /// Next payload delivered by the relay, `None` once the server side is gone
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.outbound.recv().await
    }

    /// Payload already delivered, if any
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.outbound.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (conn, mut peer) = MemoryConnection::pair(4);
        let (sink, mut source) = conn.into_parts();

        peer.send_binary(vec![1u8, 2]).await.unwrap();
        assert_eq!(
            source.recv().await.unwrap().unwrap(),
            InboundFrame::Binary(Bytes::from_static(&[1, 2]))
        );

        sink.send(Bytes::from_static(b"hi")).await.unwrap();
        assert_eq!(peer.recv().await.unwrap(), Bytes::from_static(b"hi"));

        peer.close();
        assert!(source.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_rejected_and_closed_sends() {
        let (conn, peer) = MemoryConnection::pair(4);
        let sink = conn.sink();

        peer.reject_sends();
        assert!(matches!(
            sink.send(Bytes::from_static(b"x")).await,
            Err(TransportError::Io(_))
        ));

        sink.close().await;
        assert!(peer.is_closed_by_server());
        assert!(matches!(
            sink.send(Bytes::from_static(b"x")).await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_stalled_peer_never_completes_close() {
        let (conn, peer) = MemoryConnection::pair(4);
        let sink = conn.sink();

        peer.stall_sends();
        let closed = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            sink.close(),
        )
        .await;

        assert!(closed.is_err());
        assert!(!peer.is_closed_by_server());
    }
}
