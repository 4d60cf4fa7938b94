mod connection;
mod handler;

pub use connection::{split, WebSocketSink, WebSocketSource};
pub use handler::ws_handler;
