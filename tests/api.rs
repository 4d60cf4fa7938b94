//! HTTP API tests against the router, without binding a socket.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use channel_relay::config::Settings;
use channel_relay::connection_manager::memory::MemoryConnection;
use channel_relay::connection_manager::{ChannelId, ConnectionHandle};
use channel_relay::server::{create_app, AppState};

async fn get(state: &AppState, uri: &str) -> (StatusCode, String) {
    let response = create_app(state.clone())
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

async fn get_json(state: &AppState, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get(state, uri).await;
    (status, serde_json::from_str(&body).unwrap())
}

fn register(state: &AppState, channel: &str) -> Arc<ConnectionHandle> {
    let (conn, _peer) = MemoryConnection::pair(4);
    let handle = Arc::new(ConnectionHandle::new(ChannelId::new(channel), conn.sink()));
    state.registry.register(&handle);
    handle
}

#[tokio::test]
async fn test_health_reports_counts() {
    let state = AppState::new(Settings::default());
    register(&state, "lobby");
    register(&state, "lobby");
    register(&state, "other");

    let (status, body) = get_json(&state, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["connections"]["total"], 3);
    assert_eq!(body["connections"]["channels_count"], 2);
    assert_eq!(body["shutting_down"], false);
}

#[tokio::test]
async fn test_health_during_shutdown() {
    let state = AppState::new(Settings::default());
    state.shutdown.trigger();

    let (_, body) = get_json(&state, "/health").await;
    assert_eq!(body["status"], "shutting_down");
}

#[tokio::test]
async fn test_stats_include_channels_and_broadcasts() {
    let state = AppState::new(Settings::default());
    register(&state, "lobby");

    let (status, body) = get_json(&state, "/stats").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connections"]["total_connections"], 1);
    assert_eq!(body["connections"]["channels"]["lobby"], 1);
    assert_eq!(body["broadcasts"]["total_broadcasts"], 0);
}

#[tokio::test]
async fn test_channel_listing_and_detail() {
    let state = AppState::new(Settings::default());
    register(&state, "beta");
    register(&state, "alpha");
    register(&state, "alpha");

    let (status, body) = get_json(&state, "/api/v1/channels").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_channels"], 2);
    assert_eq!(body["total_connections"], 3);
    assert_eq!(body["channels"][0]["name"], "alpha");
    assert_eq!(body["channels"][0]["member_count"], 2);

    let (status, body) = get_json(&state, "/api/v1/channels/beta").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["member_count"], 1);
}

#[tokio::test]
async fn test_unknown_channel_is_not_found() {
    let state = AppState::new(Settings::default());

    let (status, body) = get_json(&state, "/api/v1/channels/nowhere").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let state = AppState::new(Settings::default());
    register(&state, "lobby");

    let (status, body) = get(&state, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("relay_connections_active"));
    assert!(body.contains("relay_channels_active"));
}
