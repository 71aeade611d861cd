//! Live-reload messages and the WebSocket endpoint

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use super::ServerState;

/// Messages pushed to connected clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HmrMessage {
    /// Connection established
    Connected,

    /// Full page reload required
    FullReload { reason: String },

    /// Only stylesheets changed, they can be swapped in place
    CssUpdate { bundle: String, files: Vec<String> },

    /// A rebuild failed
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        bundle: Option<String>,
    },
}

impl HmrMessage {
    /// Pick the message for a finished rebuild of `bundle`
    pub fn for_rebuild(bundle: &str, files: Vec<String>) -> Self {
        let styles_only = !files.is_empty() && files.iter().all(|f| is_stylesheet(f));

        if styles_only {
            Self::CssUpdate {
                bundle: bundle.to_string(),
                files,
            }
        } else {
            Self::FullReload {
                reason: format!("Bundle '{}' rebuilt", bundle),
            }
        }
    }
}

fn is_stylesheet(path: &str) -> bool {
    let extension = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    matches!(extension, "css" | "scss" | "sass")
}

/// Handle WebSocket upgrade for live reload
pub(super) async fn hmr_websocket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> Response {
    ws.on_upgrade(|socket| handle_hmr_socket(socket, state))
}

async fn handle_hmr_socket(mut socket: WebSocket, state: Arc<ServerState>) {
    // Subscribe before announcing, so nothing sent after `connected` is missed
    let mut updates = state.hmr_tx.subscribe();

    if send_message(&mut socket, &HmrMessage::Connected).await.is_err() {
        return;
    }
    debug!("Live-reload client connected");

    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(message) = next_update(update) else {
                    break;
                };
                if send_message(&mut socket, &message).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!("Live-reload client disconnected");
}

/// Message to forward for a broadcast result, `None` once the server is gone
fn next_update(update: Result<HmrMessage, RecvError>) -> Option<HmrMessage> {
    match update {
        Ok(message) => Some(message),
        // Skipped rebuilds leave the page stale, reload it
        Err(RecvError::Lagged(missed)) => Some(HmrMessage::FullReload {
            reason: format!("{} live-reload updates missed", missed),
        }),
        Err(RecvError::Closed) => None,
    }
}

async fn send_message(socket: &mut WebSocket, message: &HmrMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(message).map_err(axum::Error::new)?;
    socket.send(Message::Text(json)).await
}
