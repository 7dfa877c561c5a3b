//! WebSocket Handler
//!
//! Live event feed for the dev UI on `/api/events`.

pub mod broadcaster;

use axum::extract::ws::{Message, WebSocket};
use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

pub use broadcaster::{LiveBroadcaster, LiveSession, SessionId};

use crate::api::AppState;

/// WebSocket upgrade handler.
pub async fn handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.broadcaster))
}

/// Handle a live session until the client goes away.
async fn handle_socket(socket: WebSocket, broadcaster: LiveBroadcaster) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (session, mut rx) = LiveSession::open();
    let session_id = session.id();
    broadcaster.register(session).await;
    info!(session_id = %session_id, "Live session connected");

    // Forward broadcast frames to the socket
    let sender_handle = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    // Clients never send anything meaningful; read only to notice the close.
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Close(_)) => {
                debug!(session_id = %session_id, "Live session closed by client");
                break;
            }
            Ok(Message::Ping(_)) => {
                debug!(session_id = %session_id, "Received ping");
            }
            Err(e) => {
                warn!(session_id = %session_id, "WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    // Cleanup
    broadcaster.unregister(session_id).await;
    sender_handle.abort();

    info!(session_id = %session_id, "Live session disconnected");
}
