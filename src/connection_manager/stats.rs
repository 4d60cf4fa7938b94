//! Registry statistics and info structures

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Registry statistics
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub total_connections: usize,
    pub total_channels: usize,
    pub channels: HashMap<String, usize>,
}

/// Channel information
#[derive(Debug, Clone, Serialize)]
pub struct ChannelInfo {
    pub name: String,
    pub member_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_member_since: Option<DateTime<Utc>>,
}
