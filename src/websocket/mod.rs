use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

pub mod message_types;

/// Unique identifier for a live WebSocket connection.
///
/// A user reconnecting gets a fresh id; `unregister` only evicts the mapping
/// when the caller's id still matches, so a stale disconnect arriving after a
/// reconnect cannot tear down the newer channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

struct Connection {
    id: ConnectionId,
    sender: UnboundedSender<String>,
}

/// Maps a live user identity to its single active real-time channel.
///
/// Last-write-wins: a new registration for the same user silently supersedes
/// the old one and the superseded receiver is closed by dropping its sender.
/// Safe for concurrent access from many session tasks.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<Uuid, Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) the channel for `user_id`.
    ///
    /// Returns the connection id to present at `unregister` time and the
    /// receiving half the session forwards into its socket.
    pub async fn register(&self, user_id: Uuid) -> (ConnectionId, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let connection = Connection {
            id: ConnectionId::new(),
            sender: tx,
        };
        let id = connection.id;

        let mut guard = self.inner.write().await;
        if guard.insert(user_id, connection).is_some() {
            tracing::debug!(%user_id, "superseded existing channel registration");
        }

        (id, rx)
    }

    /// Remove the mapping for `user_id`, only if `connection_id` still owns
    /// it. Returns whether the mapping was removed; a stale caller gets
    /// `false` and must not run any further per-user teardown.
    pub async fn unregister(&self, user_id: Uuid, connection_id: ConnectionId) -> bool {
        let mut guard = self.inner.write().await;
        match guard.get(&user_id) {
            Some(conn) if conn.id == connection_id => {
                guard.remove(&user_id);
                true
            }
            Some(_) => {
                tracing::debug!(%user_id, "ignoring stale unregister");
                false
            }
            None => false,
        }
    }

    /// Whether `user_id` currently has a live channel.
    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.inner.read().await.contains_key(&user_id)
    }

    /// Push a serialized event to `user_id`'s channel.
    ///
    /// Returns false when the user is offline or the channel is dead; dead
    /// channels are evicted on the spot. Fire-and-forget, at-most-once.
    pub async fn send_to(&self, user_id: Uuid, payload: String) -> bool {
        let guard = self.inner.read().await;
        let delivered = match guard.get(&user_id) {
            Some(conn) => conn.sender.send(payload).is_ok(),
            None => false,
        };
        drop(guard);

        if !delivered {
            let mut guard = self.inner.write().await;
            if let Some(conn) = guard.get(&user_id) {
                if conn.sender.is_closed() {
                    guard.remove(&user_id);
                    tracing::debug!(%user_id, "evicted dead channel");
                }
            }
        }
        delivered
    }

    /// Number of live registrations (debugging/metrics).
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_lookup_unregister() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();

        let (id, mut rx) = registry.register(user).await;
        assert!(registry.is_online(user).await);

        assert!(registry.send_to(user, "hello".into()).await);
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));

        assert!(registry.unregister(user, id).await);
        assert!(!registry.is_online(user).await);
        assert!(!registry.send_to(user, "late".into()).await);
    }

    #[tokio::test]
    async fn re_register_supersedes_and_stale_unregister_is_ignored() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();

        let (old_id, mut old_rx) = registry.register(user).await;
        let (_new_id, mut new_rx) = registry.register(user).await;

        // Old receiver is closed because its sender was dropped on replace.
        assert!(old_rx.recv().await.is_none());

        // Traffic lands on the new channel.
        assert!(registry.send_to(user, "ping".into()).await);
        assert_eq!(new_rx.recv().await.as_deref(), Some("ping"));

        // The old session's disconnect must not evict the new registration.
        assert!(!registry.unregister(user, old_id).await);
        assert!(registry.is_online(user).await);
        assert!(registry.send_to(user, "still here".into()).await);
        assert_eq!(new_rx.recv().await.as_deref(), Some("still here"));
    }

    #[tokio::test]
    async fn dead_channel_is_evicted_on_send() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();

        let (_id, rx) = registry.register(user).await;
        drop(rx);

        assert!(!registry.send_to(user, "into the void".into()).await);
        assert!(!registry.is_online(user).await);
    }

    #[tokio::test]
    async fn offline_send_reports_undelivered() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.send_to(Uuid::new_v4(), "nobody home".into()).await);
    }
}
