#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use uuid::Uuid;

use chat_service::models::{NewUser, User};
use chat_service::presence::{ConnectionHandle, InMemoryPresence};
use chat_service::router::Router;
use chat_service::storage::memory::MemoryStore;
use chat_service::storage::IdentityDirectory;

/// Router wired against the in-memory store; `store` stays concrete so
/// tests can seed and inspect durable state directly.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub router: Arc<Router>,
    connections: Mutex<HashMap<Uuid, Uuid>>,
}

pub fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let presence = Arc::new(InMemoryPresence::new());
    let router = Arc::new(Router::new(
        store.clone(),
        store.clone(),
        store.clone(),
        presence,
    ));
    Harness {
        store,
        router,
        connections: Mutex::new(HashMap::new()),
    }
}

impl Harness {
    pub async fn user(&self, first_name: &str) -> User {
        self.store
            .create_user(NewUser {
                first_name: first_name.to_string(),
                last_name: "Tester".to_string(),
                email: format!("{first_name}@tawk.dev"),
                avatar: None,
            })
            .await
            .expect("create user")
    }

    /// Registers a live connection for the user and returns the receive
    /// side, i.e. what the websocket writer task would drain.
    pub async fn connect(&self, user_id: Uuid) -> UnboundedReceiver<String> {
        let (tx, rx) = unbounded_channel();
        let handle = ConnectionHandle::new(tx);
        self.connections
            .lock()
            .unwrap()
            .insert(user_id, handle.id());
        self.router
            .handle_connect(user_id, handle)
            .await
            .expect("connect");
        rx
    }

    /// Connection id of the user's most recent `connect`.
    pub fn conn_id(&self, user_id: Uuid) -> Uuid {
        *self
            .connections
            .lock()
            .unwrap()
            .get(&user_id)
            .expect("user never connected")
    }

    /// Closes the user's current connection, i.e. what the websocket
    /// exit path does after the read loop ends.
    pub async fn disconnect(&self, user_id: Uuid) {
        let conn_id = self.conn_id(user_id);
        self.router
            .handle_disconnect(user_id, conn_id)
            .await
            .expect("disconnect");
    }
}

/// Pushes happen before the triggering handler returns, so a plain
/// `try_recv` is enough once the dispatch call has been awaited.
pub fn next_event(rx: &mut UnboundedReceiver<String>) -> serde_json::Value {
    let text = rx.try_recv().expect("expected a pushed event");
    serde_json::from_str(&text).expect("pushed event is json")
}

pub fn assert_no_event(rx: &mut UnboundedReceiver<String>) {
    assert!(rx.try_recv().is_err(), "expected no pushed event");
}

pub fn uuid_field(value: &serde_json::Value, field: &str) -> Uuid {
    value[field]
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(|| panic!("missing uuid field {field} in {value}"))
}
