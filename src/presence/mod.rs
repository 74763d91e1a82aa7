//! Process-local presence: which user is reachable on which live
//! connection. Entries are memory-only; a restart loses all of them and
//! every previously-connected user is implicitly offline until reconnect.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::router::events::ServerEvent;

/// Write end of one websocket connection. Pushes are best-effort: a send
/// onto a closed channel is reported, never retried.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    sender: UnboundedSender<String>,
}

impl ConnectionHandle {
    pub fn new(sender: UnboundedSender<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
        }
    }

    /// Identifies this connection so cleanup can tell a live handle from
    /// a superseded one.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn push(&self, event: &ServerEvent) -> bool {
        match serde_json::to_string(event) {
            Ok(text) => self.sender.send(text).is_ok(),
            Err(e) => {
                tracing::error!(error=%e, "failed to serialize outbound event");
                false
            }
        }
    }
}

/// Injected seam so presence can later be backed by an external pub/sub
/// layer; the durable stores and this registry share no transaction
/// boundary.
#[async_trait]
pub trait PresenceRegistry: Send + Sync {
    /// Idempotent upsert. A reconnect silently supersedes the stale handle.
    async fn register(&self, user_id: Uuid, handle: ConnectionHandle);

    async fn lookup(&self, user_id: Uuid) -> Option<ConnectionHandle>;

    /// Removes the entry only while `conn_id` is still the registered
    /// connection, so a superseded socket closing late cannot evict the
    /// handle that replaced it. Returns whether an entry was removed.
    async fn unregister(&self, user_id: Uuid, conn_id: Uuid) -> bool;
}

/// At most one live handle per user; last writer wins.
#[derive(Default, Clone)]
pub struct InMemoryPresence {
    inner: Arc<RwLock<HashMap<Uuid, ConnectionHandle>>>,
}

impl InMemoryPresence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PresenceRegistry for InMemoryPresence {
    async fn register(&self, user_id: Uuid, handle: ConnectionHandle) {
        let mut guard = self.inner.write().await;
        if guard.insert(user_id, handle).is_some() {
            tracing::debug!(%user_id, "presence entry superseded by reconnect");
        }
    }

    async fn lookup(&self, user_id: Uuid) -> Option<ConnectionHandle> {
        self.inner.read().await.get(&user_id).cloned()
    }

    async fn unregister(&self, user_id: Uuid, conn_id: Uuid) -> bool {
        let mut guard = self.inner.write().await;
        match guard.get(&user_id) {
            Some(handle) if handle.id == conn_id => {
                guard.remove(&user_id);
                true
            }
            _ => false,
        }
    }
}
