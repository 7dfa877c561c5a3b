//! Live Event Protocol
//!
//! Frames pushed to dev UI sessions connected on `/api/events`.

use serde::{Deserialize, Serialize};

use crate::types::Message;

/// Server-to-client live event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    /// A message was stored in some conversation.
    Message { message: Message },
}
