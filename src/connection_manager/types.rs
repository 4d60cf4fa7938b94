//! Connection handle, channel identifiers and the transport traits

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Opaque identity of a single connection
pub type ConnectionId = Uuid;

/// Name of a broadcast domain, taken verbatim from the request path.
///
/// Comparison is case-sensitive and no normalization is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(Arc<str>);

impl ChannelId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Validate a raw identifier from the request path.
    ///
    /// Only the byte length is limited; any characters are accepted.
    pub fn parse(raw: &str, max_len: usize) -> Result<Self, ChannelIdError> {
        if raw.is_empty() {
            return Err(ChannelIdError::Empty);
        }
        if raw.len() > max_len {
            return Err(ChannelIdError::TooLong {
                len: raw.len(),
                max: max_len,
            });
        }
        Ok(Self::new(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ChannelId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChannelId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ChannelId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelIdError {
    #[error("Channel name must not be empty")]
    Empty,
    #[error("Channel name is {len} bytes, limit is {max}")]
    TooLong { len: usize, max: usize },
}

/// Failure of a single connection's transport
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Connection closed")]
    Closed,
    #[error("Send timed out after {0:?}")]
    Timeout(Duration),
    #[error("Transport error: {0}")]
    Io(String),
}

/// A frame read from a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Binary(Bytes),
    Text(String),
    /// Ping/pong and other control frames
    Control,
}

impl InboundFrame {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Binary(_) => "binary",
            Self::Text(_) => "text",
            Self::Control => "control",
        }
    }
}

/// Sending half of a connection.
///
/// Implementations must deliver each payload as one whole frame, even when
/// several broadcasts target the same connection at once.
#[async_trait]
pub trait ConnectionSink: Send + Sync {
    async fn send(&self, payload: Bytes) -> Result<(), TransportError>;

    /// Best-effort close of the underlying transport.
    async fn close(&self) {}
}

/// Receiving half of a connection, owned by the connection's relay loop.
#[async_trait]
pub trait ConnectionSource: Send {
    /// Next inbound frame. `None` once the remote end has closed.
    async fn recv(&mut self) -> Option<Result<InboundFrame, TransportError>>;
}

/// Handle for a single relay connection
pub struct ConnectionHandle {
    pub id: ConnectionId,
    channel: ChannelId,
    sink: Arc<dyn ConnectionSink>,
    pub connected_at: DateTime<Utc>,
}

impl ConnectionHandle {
    pub fn new(channel: ChannelId, sink: Arc<dyn ConnectionSink>) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel,
            sink,
            connected_at: Utc::now(),
        }
    }

    /// The channel this connection is bound to for its whole lifetime
    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub async fn send(&self, payload: Bytes) -> Result<(), TransportError> {
        self.sink.send(payload).await
    }

    pub async fn close(&self) {
        self.sink.close().await
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("connected_at", &self.connected_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_parse() {
        assert_eq!(ChannelId::parse("lobby", 64).unwrap().as_str(), "lobby");
        assert_eq!(
            ChannelId::parse("with spaces/and ünïcode", 64).unwrap().as_str(),
            "with spaces/and ünïcode"
        );
        assert_eq!(ChannelId::parse("", 64), Err(ChannelIdError::Empty));
        assert_eq!(
            ChannelId::parse(&"a".repeat(65), 64),
            Err(ChannelIdError::TooLong { len: 65, max: 64 })
        );
        assert!(ChannelId::parse(&"a".repeat(64), 64).is_ok());
    }

    #[test]
    fn test_channel_id_is_case_sensitive() {
        assert_ne!(ChannelId::new("Lobby"), ChannelId::new("lobby"));
    }

    #[test]
    fn test_frame_kind() {
        assert_eq!(InboundFrame::Binary(Bytes::new()).kind(), "binary");
        assert_eq!(InboundFrame::Text(String::new()).kind(), "text");
        assert_eq!(InboundFrame::Control.kind(), "control");
    }
}
