use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use super::stats::{ChannelInfo, RegistryStats};
use super::types::{ChannelId, ConnectionHandle, ConnectionId};

type MemberSet = HashMap<ConnectionId, Arc<ConnectionHandle>>;

/// Tracks which connections are subscribed to which channel.
///
/// Every connection lives in the member set of exactly the channel it was
/// created for. Sets are created on first registration and dropped as soon as
/// their last member leaves.
pub struct ChannelRegistry {
    /// channel -> connection_id -> ConnectionHandle
    channels: DashMap<ChannelId, MemberSet>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Add a connection to its channel's member set.
    ///
    /// Returns `false` if the connection was already registered.
    pub fn register(&self, handle: &Arc<ConnectionHandle>) -> bool {
        let inserted = self
            .channels
            .entry(handle.channel().clone())
            .or_default()
            .insert(handle.id, handle.clone())
            .is_none();

        if inserted {
            tracing::debug!(
                connection_id = %handle.id,
                channel = %handle.channel(),
                "Connection registered"
            );
        }

        inserted
    }

    /// Remove a connection from its channel's member set.
    ///
    /// Unknown connections are ignored. Returns `true` if the connection was
    /// a member.
    pub fn unregister(&self, handle: &ConnectionHandle) -> bool {
        let channel = handle.channel();
        let removed = match self.channels.get_mut(channel.as_str()) {
            Some(mut members) => members.remove(&handle.id).is_some(),
            None => false,
        };

        // Checked under the shard lock so a concurrent register cannot be lost
        self.channels
            .remove_if(channel.as_str(), |_, members| members.is_empty());

        if removed {
            tracing::debug!(
                connection_id = %handle.id,
                channel = %channel,
                "Connection unregistered"
            );
        }

        removed
    }

    /// Register a connection and return a guard that unregisters it on drop.
    pub fn join(self: &Arc<Self>, handle: Arc<ConnectionHandle>) -> ChannelMembership {
        self.register(&handle);
        ChannelMembership {
            registry: self.clone(),
            handle,
        }
    }

    /// Snapshot of the members of a channel
    pub fn members_of(&self, channel: &str) -> Vec<Arc<ConnectionHandle>> {
        self.channels
            .get(channel)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_member(&self, channel: &str, connection_id: ConnectionId) -> bool {
        self.channels
            .get(channel)
            .is_some_and(|members| members.contains_key(&connection_id))
    }

    pub fn member_count(&self, channel: &str) -> usize {
        self.channels
            .get(channel)
            .map(|members| members.len())
            .unwrap_or(0)
    }

    /// Total connections across all channels
    pub fn connection_count(&self) -> usize {
        self.channels.iter().map(|entry| entry.value().len()).sum()
    }

    /// Channels with at least one member
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel_info(&self, channel: &str) -> Option<ChannelInfo> {
        self.channels.get(channel).map(|members| ChannelInfo {
            name: channel.to_string(),
            member_count: members.len(),
            oldest_member_since: members.values().map(|h| h.connected_at).min(),
        })
    }

    /// All channels with their member counts, sorted by name
    pub fn channels(&self) -> Vec<ChannelInfo> {
        let mut channels: Vec<ChannelInfo> = self
            .channels
            .iter()
            .map(|entry| ChannelInfo {
                name: entry.key().to_string(),
                member_count: entry.value().len(),
                oldest_member_since: entry.value().values().map(|h| h.connected_at).min(),
            })
            .collect();
        channels.sort_by(|a, b| a.name.cmp(&b.name));
        channels
    }

    pub fn stats(&self) -> RegistryStats {
        let mut channels = HashMap::new();
        for entry in self.channels.iter() {
            channels.insert(entry.key().to_string(), entry.value().len());
        }

        RegistryStats {
            total_connections: channels.values().sum(),
            total_channels: channels.len(),
            channels,
        }
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Channel membership held for the lifetime of a relay loop.
///
/// Dropping the guard unregisters the connection, whichever way the owning
/// scope is left.
pub struct ChannelMembership {
    registry: Arc<ChannelRegistry>,
    handle: Arc<ConnectionHandle>,
}

impl ChannelMembership {
    pub fn handle(&self) -> &Arc<ConnectionHandle> {
        &self.handle
    }
}

impl Drop for ChannelMembership {
    fn drop(&mut self) {
        self.registry.unregister(&self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection_manager::memory::MemoryConnection;

    fn handle(channel: &str) -> Arc<ConnectionHandle> {
        let (conn, _peer) = MemoryConnection::pair(8);
        Arc::new(ConnectionHandle::new(ChannelId::new(channel), conn.sink()))
    }

    #[test]
    fn test_register_and_members() {
        let registry = ChannelRegistry::new();
        let a = handle("lobby");
        let b = handle("lobby");
        let c = handle("other");

        assert!(registry.register(&a));
        assert!(registry.register(&b));
        assert!(registry.register(&c));

        let mut members: Vec<_> = registry.members_of("lobby").iter().map(|h| h.id).collect();
        members.sort();
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(members, expected);

        assert_eq!(registry.member_count("other"), 1);
        assert_eq!(registry.connection_count(), 3);
        assert_eq!(registry.channel_count(), 2);
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = ChannelRegistry::new();
        let a = handle("lobby");

        assert!(registry.register(&a));
        assert!(!registry.register(&a));
        assert_eq!(registry.member_count("lobby"), 1);
    }

    #[test]
    fn test_unregister_absent_is_noop() {
        let registry = ChannelRegistry::new();
        let a = handle("lobby");
        let b = handle("lobby");

        assert!(!registry.unregister(&a));
        registry.register(&b);
        assert!(!registry.unregister(&a));
        assert_eq!(registry.member_count("lobby"), 1);
    }

    #[test]
    fn test_empty_channel_is_removed() {
        let registry = ChannelRegistry::new();
        let a = handle("lobby");

        registry.register(&a);
        assert!(registry.unregister(&a));
        assert_eq!(registry.channel_count(), 0);
        assert!(registry.channel_info("lobby").is_none());
        assert!(registry.members_of("lobby").is_empty());
    }

    #[test]
    fn test_channels_are_case_sensitive() {
        let registry = ChannelRegistry::new();
        registry.register(&handle("Lobby"));
        registry.register(&handle("lobby"));

        assert_eq!(registry.member_count("Lobby"), 1);
        assert_eq!(registry.member_count("lobby"), 1);
        assert_eq!(registry.member_count("LOBBY"), 0);
    }

    #[test]
    fn test_membership_guard_unregisters_on_drop() {
        let registry = Arc::new(ChannelRegistry::new());
        let a = handle("lobby");

        let membership = registry.join(a.clone());
        assert!(registry.is_member("lobby", a.id));
        assert_eq!(membership.handle().id, a.id);

        drop(membership);
        assert!(!registry.is_member("lobby", a.id));
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn test_stats_and_listing() {
        let registry = ChannelRegistry::new();
        registry.register(&handle("b"));
        registry.register(&handle("a"));
        registry.register(&handle("a"));

        let stats = registry.stats();
        assert_eq!(stats.total_connections, 3);
        assert_eq!(stats.total_channels, 2);
        assert_eq!(stats.channels.get("a"), Some(&2));

        let names: Vec<_> = registry.channels().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);

        let info = registry.channel_info("a").unwrap();
        assert_eq!(info.member_count, 2);
        assert!(info.oldest_member_since.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_unregister() {
        let registry = Arc::new(ChannelRegistry::new());
        let handles: Vec<_> = (0..200).map(|_| handle("lobby")).collect();

        let tasks: Vec<_> = handles
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, h)| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry.register(&h);
                    tokio::task::yield_now().await;
                    if i % 2 == 0 {
                        registry.unregister(&h);
                    }
                })
            })
            .collect();
        futures::future::join_all(tasks).await;

        assert_eq!(registry.member_count("lobby"), 100);
        for (i, h) in handles.iter().enumerate() {
            assert_eq!(registry.is_member("lobby", h.id), i % 2 != 0);
        }
    }

    mod proptests {
        use super::handle;
        use crate::connection_manager::{ChannelRegistry, ConnectionHandle, ConnectionId};
        use proptest::prelude::*;
        use std::collections::{HashMap, HashSet};
        use std::sync::Arc;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn concurrent_membership_matches_expected(
                ops in proptest::collection::vec((0usize..3, 0usize..16, any::<bool>()), 1..128)
            ) {
                let channels = ["lobby", "other", "third"];
                let handles: Vec<Vec<Arc<ConnectionHandle>>> = channels
                    .iter()
                    .map(|c| (0..16).map(|_| handle(c)).collect())
                    .collect();

                // Each connection's ops run in order on its own thread; different
                // connections race each other.
                let mut per_conn: HashMap<(usize, usize), Vec<bool>> = HashMap::new();
                for (c, i, add) in &ops {
                    per_conn.entry((*c, *i)).or_default().push(*add);
                }

                let mut expected: HashSet<ConnectionId> = HashSet::new();
                for ((c, i), seq) in &per_conn {
                    if *seq.last().unwrap() {
                        expected.insert(handles[*c][*i].id);
                    }
                }

                let registry = Arc::new(ChannelRegistry::new());
                std::thread::scope(|scope| {
                    for ((c, i), seq) in &per_conn {
                        let registry = registry.clone();
                        let h = handles[*c][*i].clone();
                        scope.spawn(move || {
                            for add in seq {
                                if *add {
                                    registry.register(&h);
                                } else {
                                    registry.unregister(&h);
                                }
                            }
                        });
                    }
                });

                let mut actual: HashSet<ConnectionId> = HashSet::new();
                let mut total = 0;
                for channel in channels {
                    for member in registry.members_of(channel) {
                        prop_assert_eq!(member.channel().as_str(), channel);
                        prop_assert!(actual.insert(member.id));
                        total += 1;
                    }
                }

                prop_assert_eq!(total, expected.len());
                prop_assert_eq!(actual, expected);
                prop_assert_eq!(registry.connection_count(), total);
                for channel in channels {
                    let count = registry.member_count(channel);
                    prop_assert_eq!(registry.channel_info(channel).is_some(), count > 0);
                }
            }
        }
    }
}
