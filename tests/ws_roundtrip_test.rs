//! End-to-end exercise over a real websocket: two clients connect to a
//! served instance backed by the in-memory store and run the whole
//! handshake-to-message flow.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use chat_service::config::Config;
use chat_service::models::{NewUser, User};
use chat_service::presence::InMemoryPresence;
use chat_service::router::Router;
use chat_service::state::AppState;
use chat_service::storage::memory::MemoryStore;
use chat_service::storage::IdentityDirectory;

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn seed_user(store: &MemoryStore, first_name: &str) -> User {
    store
        .create_user(NewUser {
            first_name: first_name.to_string(),
            last_name: "Wire".to_string(),
            email: format!("{first_name}@tawk.dev"),
            avatar: None,
        })
        .await
        .expect("seed user")
}

async fn serve() -> (String, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let presence = Arc::new(InMemoryPresence::new());
    let router = Arc::new(Router::new(
        store.clone(),
        store.clone(),
        store.clone(),
        presence,
    ));
    let state = AppState {
        router,
        config: Arc::new(Config::test_defaults()),
    };
    let app = chat_service::app(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (addr.to_string(), store)
}

async fn open(addr: &str, user_id: Uuid) -> WsClient {
    let (ws, _) = connect_async(format!("ws://{addr}/ws?user_id={user_id}"))
        .await
        .expect("websocket connect");
    ws
}

async fn send(ws: &mut WsClient, event: Value) {
    ws.send(WsMessage::Text(event.to_string()))
        .await
        .expect("send event");
}

async fn recv(ws: &mut WsClient) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .expect("websocket error");
        if let WsMessage::Text(text) = frame {
            return serde_json::from_str(&text).expect("event is json");
        }
    }
}

#[tokio::test]
async fn full_flow_over_the_wire() {
    let (addr, store) = serve().await;
    let amina = seed_user(&store, "amina").await;
    let bela = seed_user(&store, "bela").await;

    let mut ws_a = open(&addr, amina.id).await;
    let mut ws_b = open(&addr, bela.id).await;

    // Friend request handshake.
    send(
        &mut ws_a,
        json!({"type": "friend_request", "to": bela.id, "from": amina.id}),
    )
    .await;
    let to_b = recv(&mut ws_b).await;
    assert_eq!(to_b["type"], "new_friend_request");
    let to_a = recv(&mut ws_a).await;
    assert_eq!(to_a["type"], "request_sent");
    let request_id = to_a["request_id"].as_str().expect("request id");

    send(&mut ws_b, json!({"type": "accept_request", "request_id": request_id})).await;
    assert_eq!(recv(&mut ws_a).await["type"], "request_accepted");
    assert_eq!(recv(&mut ws_b).await["type"], "request_accepted");

    // Open the thread and exchange a message.
    send(
        &mut ws_a,
        json!({"type": "start_conversation", "to": bela.id, "from": amina.id}),
    )
    .await;
    let chat = recv(&mut ws_a).await;
    assert_eq!(chat["type"], "start_chat");
    let conversation_id = chat["conversation"]["id"].as_str().expect("conversation id");

    send(
        &mut ws_a,
        json!({
            "type": "text_message",
            "to": bela.id,
            "from": amina.id,
            "message": "hello over the wire",
            "conversation_id": conversation_id,
        }),
    )
    .await;

    let new_b = recv(&mut ws_b).await;
    assert_eq!(new_b["type"], "new_message");
    assert_eq!(new_b["message"]["text"], "hello over the wire");
    let new_a = recv(&mut ws_a).await;
    assert_eq!(new_a["type"], "new_message");

    // An explicit end tells the now-friend peer about the transition.
    send(&mut ws_b, json!({"type": "end", "user_id": bela.id})).await;
    let status = recv(&mut ws_a).await;
    assert_eq!(status["type"], "friend_status");
    assert_eq!(status["status"], "offline");
}

#[tokio::test]
async fn unknown_user_handshake_is_refused() {
    let (addr, _store) = serve().await;
    let result = connect_async(format!("ws://{addr}/ws?user_id={}", Uuid::new_v4())).await;
    assert!(result.is_err(), "upgrade should be rejected");
}

#[tokio::test]
async fn failed_operation_reports_an_error_event() {
    let (addr, store) = serve().await;
    let amina = seed_user(&store, "amina").await;
    let mut ws_a = open(&addr, amina.id).await;

    send(
        &mut ws_a,
        json!({
            "type": "text_message",
            "to": amina.id,
            "from": amina.id,
            "message": "into the void",
            "conversation_id": Uuid::new_v4(),
        }),
    )
    .await;

    let error = recv(&mut ws_a).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["message"], "not found");
}
