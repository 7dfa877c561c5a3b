//! Live Event Broadcaster
//!
//! Registry of open dev UI sessions. Every stored message is pushed to all
//! of them as one text frame.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};
use uuid::Uuid;
use wadev_common::{LiveEvent, Message};

/// Frames buffered per session before new ones are dropped.
pub const SESSION_BUFFER: usize = 100;

/// Identifier of one live session.
pub type SessionId = Uuid;

/// Sending half of one live session.
///
/// The receiving half is drained by the session's socket writer.
#[derive(Debug)]
pub struct LiveSession {
    id: SessionId,
    outbox: mpsc::Sender<String>,
}

impl LiveSession {
    /// Create a session and the receiver its writer drains.
    pub fn open() -> (Self, mpsc::Receiver<String>) {
        let (outbox, rx) = mpsc::channel(SESSION_BUFFER);
        (
            Self {
                id: Uuid::now_v7(),
                outbox,
            },
            rx,
        )
    }

    pub const fn id(&self) -> SessionId {
        self.id
    }
}

/// Fan-out of live events to every registered session.
#[derive(Debug, Clone, Default)]
pub struct LiveBroadcaster {
    sessions: Arc<Mutex<HashMap<SessionId, LiveSession>>>,
}

impl LiveBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, session: LiveSession) {
        let id = session.id;
        let mut sessions = self.sessions.lock().await;
        if sessions.insert(id, session).is_some() {
            error!(session_id = %id, "BUG: live session registered twice");
        }
        debug!(session_id = %id, open = sessions.len(), "Live session registered");
    }

    /// Remove session `id`. Returns whether it was registered.
    pub async fn unregister(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.lock().await;
        let found = sessions.remove(&id).is_some();
        if found {
            debug!(session_id = %id, open = sessions.len(), "Live session unregistered");
        } else {
            error!(session_id = %id, "BUG: unregistering a live session that is not registered");
        }
        found
    }

    /// Queue `frame` on every session. Returns how many sessions accepted it.
    ///
    /// A full or closed session is skipped; the others still get the frame.
    pub async fn broadcast(&self, frame: &str) -> usize {
        let sessions = self.sessions.lock().await;
        let mut delivered = 0;
        for (id, session) in sessions.iter() {
            match session.outbox.try_send(frame.to_owned()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(session_id = %id, "Live session is lagging, dropping frame");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(session_id = %id, "Live session is closing, skipping frame");
                }
            }
        }
        delivered
    }

    /// Serialize and broadcast `event`.
    pub async fn broadcast_event(&self, event: &LiveEvent) -> usize {
        match serde_json::to_string(event) {
            Ok(frame) => self.broadcast(&frame).await,
            Err(e) => {
                error!("Failed to serialize live event: {}", e);
                0
            }
        }
    }

    /// Broadcast a `message` event.
    pub async fn send_message(&self, message: &Message) -> usize {
        self.broadcast_event(&LiveEvent::Message {
            message: message.clone(),
        })
        .await
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
