//! Relay engine: channel broadcast and per-connection relay loops

mod broadcaster;
mod handler;

pub use broadcaster::{BroadcastOutcome, BroadcastStats, BroadcastStatsSnapshot, Broadcaster};
pub use handler::{CloseReason, ConnectionHandler};
