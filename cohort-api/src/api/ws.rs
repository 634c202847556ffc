//! WebSocket endpoint feeding the presence registry
//!
//! The socket's only outbound traffic is what the registry pushes through
//! the per-connection channel (count updates and unicasts). The only
//! meaningful inbound frame is a late identity claim:
//! `{"type": "auth", "username": "..."}`.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Query, State};
use axum::response::Response;
use cohort_common::auth;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// GET /ws/online-count?token=
pub async fn online_count(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    let source_addr = connect_info
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    // Identity defaults to the source address; a valid token names the user
    let identity = params
        .token
        .as_deref()
        .and_then(|t| auth::verify_token(t, &state.config.secret))
        .unwrap_or_else(|| source_addr.clone());

    ws.on_upgrade(move |socket| handle_socket(state, socket, identity, source_addr))
}

async fn handle_socket(
    state: AppState,
    socket: WebSocket,
    identity: String,
    source_addr: String,
) {
    let id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let (mut sink, mut stream) = socket.split();

    state.presence.connect(id, identity, source_addr, tx);

    // Writer task drains the registry's channel onto the socket. A send
    // failure ends the task but never mutates the registry; removal waits
    // for the read side to observe the close.
    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        if let Message::Text(text) = message {
            handle_client_frame(&state, id, &text);
        }
    }

    state.presence.disconnect(id);
    writer.abort();
}

fn handle_client_frame(state: &AppState, id: Uuid, text: &str) {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        return;
    };
    if value.get("type").and_then(Value::as_str) != Some("auth") {
        return;
    }
    if let Some(username) = value.get("username").and_then(Value::as_str) {
        if !username.is_empty() {
            state.presence.reidentify(id, username);
        }
    }
}
