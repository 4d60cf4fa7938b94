use axum::{routing::get, Router};

use crate::server::AppState;

use super::connection::{get_channel, list_channels};
use super::health::{health, stats};
use super::metrics::prometheus_metrics;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Channel inspection
        .nest(
            "/api/v1",
            Router::new()
                .route("/channels", get(list_channels))
                .route("/channels/{name}", get(get_channel)),
        )
}
