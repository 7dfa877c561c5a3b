//! Conversation Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of the conversation sent a message.
///
/// `Incoming` messages were sent by the business through the Cloud API,
/// `Outgoing` messages were typed by the simulated customer in the dev UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "in")]
    Incoming,
    #[serde(rename = "out")]
    Outgoing,
}

/// A chat thread with one counterparty phone number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: u64,
    /// External identifier reported as `wa_id` in webhook payloads.
    pub phone_number_id: String,
    /// Parsed phone number, digits only.
    pub phone_number: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: u64,
    pub conversation_id: u64,
    /// Platform message id (`wamid.…`).
    #[serde(rename = "whatsappID")]
    pub whatsapp_id: String,
    pub direction: Direction,
    pub header_message: Option<String>,
    pub message: String,
    pub footer_message: Option<String>,
    /// Seconds since the unix epoch.
    pub timestamp: i64,
    /// Set when the message is a button click; the webhook then reports a
    /// button event instead of a text event.
    pub payload: Option<String>,
    pub buttons: Vec<MessageButton>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Whether this message represents a quick-reply button click.
    #[must_use]
    pub const fn is_button_reply(&self) -> bool {
        self.payload.is_some()
    }
}

/// Quick-reply button attached to a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageButton {
    pub id: u64,
    pub conversation_id: u64,
    pub message_id: u64,
    pub text: String,
    pub payload: Option<String>,
}

/// Fields of a message that is about to be stored; ids and the creation time
/// are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub whatsapp_id: String,
    pub direction: Direction,
    pub header_message: Option<String>,
    pub message: String,
    pub footer_message: Option<String>,
    pub timestamp: i64,
    pub payload: Option<String>,
    pub buttons: Vec<NewMessageButton>,
}

impl NewMessage {
    /// A plain text message without header, footer or buttons.
    #[must_use]
    pub fn text(
        whatsapp_id: impl Into<String>,
        direction: Direction,
        message: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            whatsapp_id: whatsapp_id.into(),
            direction,
            header_message: None,
            message: message.into(),
            footer_message: None,
            timestamp,
            payload: None,
            buttons: Vec::new(),
        }
    }
}

/// A button that is about to be attached to a new message.
#[derive(Debug, Clone)]
pub struct NewMessageButton {
    pub text: String,
    pub payload: Option<String>,
}
