mod settings;

pub use settings::{
    LogFormat, LoggingConfig, OtelConfig, ServerConfig, Settings, WebSocketConfig,
};
