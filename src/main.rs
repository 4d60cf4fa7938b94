use anyhow::Result;
use tokio::net::TcpListener;

use channel_relay::config::Settings;
use channel_relay::server::{create_app, AppState};
use channel_relay::shutdown;
use channel_relay::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing
    let _telemetry = init_telemetry(&settings.logging, &settings.otel)?;
    tracing::info!("Configuration loaded");

    // Create application state
    let state = AppState::new(settings.clone());
    let registry = state.registry.clone();
    let shutdown_signal = state.shutdown.clone();

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Stop accepting on SIGINT/SIGTERM and tell every relay loop to close
    let signal = shutdown_signal.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown::wait_for_os_signal().await;
            signal.trigger();
        })
        .await?;

    shutdown::drain_connections(
        &shutdown_signal,
        &registry,
        settings.server.shutdown_timeout(),
    )
    .await;

    tracing::info!("Server shutdown complete");
    Ok(())
}
