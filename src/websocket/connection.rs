//! axum websocket adapter for the connection traits

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;

use crate::connection_manager::{ConnectionSink, ConnectionSource, InboundFrame, TransportError};

/// Split an upgraded socket into the relay's sink and source halves.
pub fn split(socket: WebSocket) -> (WebSocketSink, WebSocketSource) {
    let (sender, receiver) = socket.split();
    (
        WebSocketSink {
            sender: Mutex::new(sender),
        },
        WebSocketSource { receiver },
    )
}

pub struct WebSocketSink {
    // One frame at a time, so concurrent broadcasts never interleave
    sender: Mutex<SplitSink<WebSocket, Message>>,
}

#[async_trait]
impl ConnectionSink for WebSocketSink {
    async fn send(&self, payload: Bytes) -> Result<(), TransportError> {
        self.sender
            .lock()
            .await
            .send(Message::Binary(payload))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn close(&self) {
        let _ = self.sender.lock().await.close().await;
    }
}

pub struct WebSocketSource {
    receiver: SplitStream<WebSocket>,
}

#[async_trait]
impl ConnectionSource for WebSocketSource {
    async fn recv(&mut self) -> Option<Result<InboundFrame, TransportError>> {
        match self.receiver.next().await? {
            Ok(Message::Binary(payload)) => Some(Ok(InboundFrame::Binary(payload))),
            Ok(Message::Text(text)) => Some(Ok(InboundFrame::Text(text.as_str().to_owned()))),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => Some(Ok(InboundFrame::Control)),
            Ok(Message::Close(frame)) => {
                tracing::debug!(close_frame = ?frame, "Received close frame");
                None
            }
            Err(e) => Some(Err(TransportError::Io(e.to_string()))),
        }
    }
}
