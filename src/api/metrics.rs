//! Prometheus metrics endpoint.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};

use crate::error::Result;
use crate::metrics::{self, ConnectionMetrics};
use crate::server::AppState;

/// GET /metrics - Prometheus metrics endpoint
pub async fn prometheus_metrics(State(state): State<AppState>) -> Result<impl IntoResponse> {
    ConnectionMetrics::set_active(
        state.registry.connection_count(),
        state.registry.channel_count(),
    );

    let output = metrics::encode_metrics()?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        output,
    ))
}
