use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::connection_manager::ChannelRegistry;
use crate::relay::{Broadcaster, ConnectionHandler};
use crate::shutdown::ShutdownSignal;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<ChannelRegistry>,
    pub broadcaster: Arc<Broadcaster>,
    pub connection_handler: ConnectionHandler,
    pub shutdown: ShutdownSignal,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let registry = Arc::new(ChannelRegistry::new());
        let broadcaster = Arc::new(Broadcaster::new(
            registry.clone(),
            settings.websocket.send_timeout(),
        ));
        let shutdown = ShutdownSignal::new();
        let connection_handler =
            ConnectionHandler::new(registry.clone(), broadcaster.clone(), shutdown.clone());

        Self {
            settings: Arc::new(settings),
            registry,
            broadcaster,
            connection_handler,
            shutdown,
            started_at: Instant::now(),
        }
    }
}
