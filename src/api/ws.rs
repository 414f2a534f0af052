//! WebSocket streaming endpoint.
//!
//! `GET /ws/v1/chat/completions` upgrades the connection to a WebSocket
//! carrying one streaming chat completion.
//!
//! ## Protocol
//!
//! | # | Direction | Content |
//! |---|---|---|
//! | 1 | Client → Server | `{"api_key": "…"}` |
//! | 2 | Client → Server | completion request payload |
//! | 3 | Server → Client | raw upstream chunks as text frames |
//! | — | Server → Client | `{"error": "…"}` once, if the session fails |
//!
//! The session is registered before the handshake and unregistered exactly
//! once when the handler returns, whichever path ended it — normal
//! completion, caller disconnect, malformed handshake, or internal
//! failure. One egress task is the sole writer to the socket; everything
//! outbound goes through the session's channel.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::api::auth::authorize_key;
use crate::api::handlers::AppState;
use crate::api::models::CompletionRequest;
use crate::services::sessions::{run_stream_session, send_error_notification};

const ERR_API_KEY_REQUIRED: &str = "API Key is required";
const ERR_INVALID_FORMAT: &str = "Invalid JSON message format received from client.";

/// WebSocket upgrade handler for streaming chat completions.
pub async fn ws_chat_completions(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_session(socket, state))
}

async fn handle_session(socket: WebSocket, state: Arc<AppState>) {
    let session_id = uuid::Uuid::new_v4().to_string();
    let (socket_tx, mut socket_rx) = socket.split();

    let (tx, rx) = mpsc::channel::<String>(64);
    state.sessions.register(&session_id, tx);
    tracing::info!(session_id = %session_id, "Streaming session opened");

    let egress = tokio::spawn(egress_loop(socket_tx, rx));

    drive_session(&state, &session_id, &mut socket_rx).await;

    // Teardown happens exactly once, whatever path ended the session.
    // Removing the registry entry drops the last sender, so the egress
    // task flushes anything already queued and then ends.
    state.sessions.remove(&session_id);
    let _ = egress.await;
    tracing::info!(session_id = %session_id, "Streaming session closed");
}

/// Sole writer to the caller's socket: drains the session channel.
///
/// A failed socket send means the caller is gone; dropping the receiver
/// makes every later registry send fail, which stops the relay promptly.
async fn egress_loop(
    mut socket_tx: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<String>,
) {
    while let Some(text) = rx.recv().await {
        if socket_tx.send(Message::Text(text)).await.is_err() {
            tracing::debug!("Caller socket closed; egress stopping");
            break;
        }
    }
    let _ = socket_tx.close().await;
}

/// Run the handshake and, if it succeeds, the relay.
async fn drive_session(
    state: &Arc<AppState>,
    session_id: &str,
    socket_rx: &mut SplitStream<WebSocket>,
) {
    // First message: credential
    let auth_text = match read_text_frame(socket_rx).await {
        ReadFrame::Text(text) => text,
        ReadFrame::Malformed => {
            send_error_notification(&state.sessions, session_id, ERR_INVALID_FORMAT).await;
            return;
        }
        ReadFrame::Closed => return,
    };

    let api_key = match parse_auth_message(&auth_text) {
        Ok(key) => key,
        Err(message) => {
            send_error_notification(&state.sessions, session_id, message).await;
            return;
        }
    };

    let identity = match authorize_key(&api_key, &state.config.credentials) {
        Ok(identity) => identity,
        Err(_) => {
            send_error_notification(&state.sessions, session_id, ERR_API_KEY_REQUIRED).await;
            return;
        }
    };

    if let Err(error) = state.rate_limiter.check_rate_limit(&identity.key_hash()) {
        send_error_notification(&state.sessions, session_id, &error.to_string()).await;
        return;
    }

    // Second message: completion payload
    let config_text = match read_text_frame(socket_rx).await {
        ReadFrame::Text(text) => text,
        ReadFrame::Malformed => {
            send_error_notification(&state.sessions, session_id, ERR_INVALID_FORMAT).await;
            return;
        }
        ReadFrame::Closed => return,
    };

    let payload = match parse_config_message(&config_text) {
        Ok(payload) => payload,
        Err(message) => {
            send_error_notification(&state.sessions, session_id, message).await;
            return;
        }
    };

    tracing::debug!(
        session_id,
        credential = identity.name.as_deref().unwrap_or("anonymous"),
        "Handshake complete, establishing upstream stream"
    );

    let endpoints = state.endpoints_snapshot();
    run_stream_session(
        &state.failover,
        &endpoints,
        &state.sessions,
        session_id,
        &identity.key,
        payload,
    )
    .await;
}

/// Parse the first handshake message: `{"api_key": "…"}`.
fn parse_auth_message(text: &str) -> Result<String, &'static str> {
    let message: Value = serde_json::from_str(text).map_err(|_| ERR_INVALID_FORMAT)?;
    match message.get("api_key").and_then(Value::as_str) {
        Some(key) if !key.is_empty() => Ok(key.to_string()),
        _ => Err(ERR_API_KEY_REQUIRED),
    }
}

/// Parse and validate the second handshake message: the completion payload.
fn parse_config_message(text: &str) -> Result<Value, &'static str> {
    let payload: Value = serde_json::from_str(text).map_err(|_| ERR_INVALID_FORMAT)?;
    CompletionRequest::validate(&payload).map_err(|_| ERR_INVALID_FORMAT)?;
    Ok(payload)
}

enum ReadFrame {
    Text(String),
    Malformed,
    Closed,
}

/// Read the next text frame, ignoring ping/pong.
async fn read_text_frame(socket_rx: &mut SplitStream<WebSocket>) -> ReadFrame {
    loop {
        match socket_rx.next().await {
            Some(Ok(Message::Text(text))) => return ReadFrame::Text(text),
            // A binary frame where a JSON text message is expected
            Some(Ok(Message::Binary(_))) => return ReadFrame::Malformed,
            Some(Ok(Message::Close(_))) | None => return ReadFrame::Closed,
            Some(Ok(_)) => continue,
            Some(Err(error)) => {
                tracing::debug!(error = %error, "WebSocket receive error during handshake");
                return ReadFrame::Closed;
            }
        }
    }
}
