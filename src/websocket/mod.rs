//! Connection layer: one reader task per socket driving the router, one
//! writer task draining the unbounded channel that the presence registry
//! hands out as this connection's handle.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc::unbounded_channel;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::metrics;
use crate::presence::ConnectionHandle;
use crate::router::events::ClientEvent;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub user_id: Uuid,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    // Reject unknown identities before upgrading.
    if let Err(e) = state.router.verify_user(params.user_id).await {
        warn!(user_id=%params.user_id, error=%e, "websocket handshake rejected");
        return StatusCode::BAD_REQUEST.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(state, params, socket))
}

async fn handle_socket(state: AppState, params: WsParams, socket: WebSocket) {
    let user_id = params.user_id;
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = unbounded_channel::<String>();
    let handle = ConnectionHandle::new(tx);
    let conn_id = handle.id();

    if let Err(e) = state.router.handle_connect(user_id, handle).await {
        warn!(%user_id, error=%e, "connect handling failed");
        return;
    }
    metrics::record_ws_opened();

    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(incoming) = stream.next().await {
        match incoming {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                // `end` closes this connection; the exit path below owns
                // the presence teardown.
                Ok(ClientEvent::End { .. }) => {
                    metrics::record_event("end");
                    break;
                }
                Ok(event) => {
                    if let Err(e) = state.router.dispatch(user_id, event).await {
                        debug!(%user_id, error=%e, "event failed");
                        state.router.push_error(user_id, &e).await;
                    }
                }
                Err(e) => {
                    warn!(%user_id, error=%e, "ignoring malformed event");
                }
            },
            Ok(Message::Close(_)) | Err(_) => break,
            // Ping/pong handled by the framework; binary frames ignored.
            Ok(_) => {}
        }
    }

    writer.abort();
    if let Err(e) = state.router.handle_disconnect(user_id, conn_id).await {
        warn!(%user_id, error=%e, "disconnect handling failed");
    }
    metrics::record_ws_closed();
}
