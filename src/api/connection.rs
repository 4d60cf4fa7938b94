//! Channel inspection endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::connection_manager::ChannelInfo;
use crate::error::{AppError, Result};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct ChannelListResponse {
    pub channels: Vec<ChannelInfo>,
    pub total_channels: usize,
    pub total_connections: usize,
}

/// GET /api/v1/channels - List all channels with member counts
pub async fn list_channels(State(state): State<AppState>) -> Json<ChannelListResponse> {
    let channels = state.registry.channels();
    let total_connections = channels.iter().map(|c| c.member_count).sum();

    Json(ChannelListResponse {
        total_channels: channels.len(),
        total_connections,
        channels,
    })
}

/// GET /api/v1/channels/{name} - Get channel details
pub async fn get_channel(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ChannelInfo>> {
    state
        .registry
        .channel_info(&name)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Channel '{}' has no members", name)))
}
