// Supporting modules
pub mod config;
pub mod error;
pub mod metrics;
pub mod shutdown;
pub mod telemetry;

// Domain layer
pub mod connection_manager;
pub mod relay;

// Application layer
pub mod api;
pub mod server;
pub mod websocket;
