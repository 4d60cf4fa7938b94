//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::connection_manager::RegistryStats;
use crate::relay::BroadcastStatsSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub shutting_down: bool,
    pub connections: ConnectionHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct ConnectionHealthResponse {
    pub total: usize,
    pub channels_count: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub connections: RegistryStats,
    pub broadcasts: BroadcastStatsSnapshot,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let shutting_down = state.shutdown.is_triggered();

    Json(HealthResponse {
        status: if shutting_down { "shutting_down" } else { "healthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        shutting_down,
        connections: ConnectionHealthResponse {
            total: state.registry.connection_count(),
            channels_count: state.registry.channel_count(),
        },
    })
}

/// GET /stats
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        connections: state.registry.stats(),
        broadcasts: state.broadcaster.stats(),
    })
}
