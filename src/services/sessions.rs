//! Streaming session management.
//!
//! Tracks live caller-facing sessions and relays upstream byte chunks to
//! them. Each session owns an mpsc channel whose receiver is drained by a
//! single egress task — the sole writer to the caller's socket — so
//! outbound sends can never interleave even if a relay and a keepalive
//! both try to write.
//!
//! Once a stream has started flowing, a mid-relay break is fatal for the
//! session: partial output has already been delivered, and resuming from a
//! different endpoint would duplicate or corrupt content. Establishment
//! failures, by contrast, fail over exactly like the unary path.

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::core::config::EndpointConfig;
use crate::core::error::GatewayError;
use crate::core::metrics::get_metrics;
use crate::services::failover::FailoverService;
use crate::services::upstream::classify_stream_break;

/// Registry of live streaming sessions: id → outbound channel.
///
/// One mutex guards the whole map; insert and remove are the only
/// read-modify-write sequences and both are short.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, mpsc::Sender<String>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Register a session's outbound channel under its id.
    pub fn register(&self, session_id: &str, tx: mpsc::Sender<String>) {
        let mut sessions = self.sessions.lock().expect("session registry lock");
        sessions.insert(session_id.to_string(), tx);
        get_metrics().active_sessions.set(sessions.len() as i64);
    }

    /// Remove a session. Returns whether it was present; removing an
    /// already-removed session is a no-op.
    pub fn remove(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.lock().expect("session registry lock");
        let removed = sessions.remove(session_id).is_some();
        get_metrics().active_sessions.set(sessions.len() as i64);
        removed
    }

    /// Whether a session id is currently registered.
    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .expect("session registry lock")
            .contains_key(session_id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().expect("session registry lock").len()
    }

    /// True when no sessions are live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send one text frame to a session.
    ///
    /// Returns false when the session is not registered or its caller is
    /// gone (receiver dropped); the caller of this method treats false as
    /// "stop producing output for this session".
    pub async fn send(&self, session_id: &str, text: String) -> bool {
        let tx = {
            let sessions = self.sessions.lock().expect("session registry lock");
            match sessions.get(session_id) {
                Some(tx) => tx.clone(),
                None => {
                    tracing::debug!(session_id, "Send to unregistered session dropped");
                    return false;
                }
            }
        };

        if let Err(error) = tx.send(text).await {
            tracing::error!(session_id, error = %error, "Error sending message to session");
            return false;
        }
        true
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// How a relay ended.
#[derive(Debug)]
pub enum RelayEnd<E> {
    /// Upstream finished the stream normally
    Completed,
    /// The caller disconnected; no further output is deliverable
    CallerGone,
    /// The upstream byte stream failed after the initial 200
    UpstreamBroke(E),
}

/// Relay every non-empty chunk from an upstream byte stream to a session.
///
/// Stops at the first chunk error (fatal for the session — the caller
/// decides what notification to send) or the first failed delivery
/// (caller disconnected — stop draining upstream promptly).
pub async fn relay_chunks<S, E>(
    mut chunks: S,
    registry: &SessionRegistry,
    session_id: &str,
) -> RelayEnd<E>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    while let Some(item) = chunks.next().await {
        match item {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                if text.trim().is_empty() {
                    continue;
                }
                if !registry.send(session_id, text.into_owned()).await {
                    return RelayEnd::CallerGone;
                }
            }
            Err(error) => return RelayEnd::UpstreamBroke(error),
        }
    }
    RelayEnd::Completed
}

/// Send the single `{"error": …}` notification a failed session gets.
pub async fn send_error_notification(
    registry: &SessionRegistry,
    session_id: &str,
    message: &str,
) {
    let frame = json!({ "error": message }).to_string();
    registry.send(session_id, frame).await;
}

/// Drive one streaming session: establish with failover, then relay.
///
/// The session must already be registered; teardown (unregistering) is the
/// calling handler's job and happens exactly once after this returns,
/// whatever the exit path.
pub async fn run_stream_session(
    failover: &FailoverService,
    endpoints: &[EndpointConfig],
    registry: &SessionRegistry,
    session_id: &str,
    api_key: &str,
    mut payload: Value,
) {
    // The websocket surface only speaks streaming
    if let Some(object) = payload.as_object_mut() {
        object.insert("stream".to_string(), Value::Bool(true));
    }

    let (endpoint, response) = match failover.run_stream(endpoints, api_key, &payload).await {
        Ok(accepted) => accepted,
        Err(error) => {
            tracing::warn!(
                session_id,
                error = %error,
                "No endpoint accepted the streaming session"
            );
            send_error_notification(registry, session_id, &error.to_string()).await;
            return;
        }
    };

    let stream = response.bytes_stream();
    futures::pin_mut!(stream);

    match relay_chunks(stream, registry, session_id).await {
        RelayEnd::Completed => {
            tracing::info!(session_id, endpoint = %endpoint.name, "Stream completed");
        }
        RelayEnd::CallerGone => {
            tracing::info!(
                session_id,
                endpoint = %endpoint.name,
                "Caller disconnected mid-stream; upstream drain stopped"
            );
        }
        RelayEnd::UpstreamBroke(error) => {
            let classified = classify_stream_break(&error, &endpoint);
            tracing::error!(
                session_id,
                endpoint = %endpoint.name,
                error = %error,
                "Unexpected error from AI service during stream"
            );
            let message = match classified {
                GatewayError::Timeout => classified.to_string(),
                _ => format!(
                    "An unexpected problem occurred while streaming from AI service: {}.",
                    endpoint.name
                ),
            };
            send_error_notification(registry, session_id, &message).await;
        }
    }
}
