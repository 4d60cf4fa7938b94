//! Channel membership: connection handles, transport traits and the registry

#[cfg(any(test, feature = "test-util"))]
pub mod memory;
mod registry;
mod stats;
mod types;

pub use registry::{ChannelMembership, ChannelRegistry};
pub use stats::{ChannelInfo, RegistryStats};
pub use types::{
    ChannelId, ChannelIdError, ConnectionHandle, ConnectionId, ConnectionSink, ConnectionSource,
    InboundFrame, TransportError,
};
