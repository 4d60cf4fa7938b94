use std::sync::Arc;

use axum::{
    extract::{ws::WebSocket, Path, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
};

use crate::connection_manager::{ChannelId, ConnectionHandle};
use crate::error::Result;
use crate::metrics::ConnectionMetrics;
use crate::server::AppState;

use super::connection;

/// WebSocket upgrade handler for `GET /channel/{channel}`
#[tracing::instrument(name = "ws.upgrade", skip(ws, state))]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(channel): Path<String>,
    State(state): State<AppState>,
) -> Result<Response> {
    let channel = ChannelId::parse(&channel, state.settings.websocket.max_channel_name_length)?;

    tracing::debug!(channel = %channel, "WebSocket upgrade requested");

    let response = ws
        .max_message_size(state.settings.websocket.max_message_size)
        .on_failed_upgrade(|e| {
            ConnectionMetrics::record_upgrade_failed();
            tracing::warn!(error = %e, "WebSocket upgrade failed");
        })
        .on_upgrade(move |socket| handle_socket(socket, state, channel));

    Ok(response.into_response())
}

/// Relay an established WebSocket connection until it closes
async fn handle_socket(socket: WebSocket, state: AppState, channel: ChannelId) {
    let (sink, source) = connection::split(socket);
    let handle = Arc::new(ConnectionHandle::new(channel, Arc::new(sink)));

    state.connection_handler.run(handle, source).await;
}
