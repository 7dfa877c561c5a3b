//! Webhook Payload
//!
//! Builds the `whatsapp_business_account` envelope sent to the webhook for
//! each stored message.

use serde::Serialize;
use wadev_common::{Conversation, Message};

use super::signing::{self, SignatureSet};
use super::types::DeliveryError;
use crate::config::PlatformSettings;

/// Contact name reported for every counterparty.
pub const CONTACT_NAME_PLACEHOLDER: &str = "John Doe";

/// One outbound notification, built per dispatch and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    /// Id of the originating message.
    pub event_id: u64,
    pub conversation_phone: String,
    pub conversation_external_id: String,
    /// `wamid.…` id of the originating message.
    pub message_id: String,
    /// Seconds since the unix epoch.
    pub timestamp: i64,
    pub body: NotificationBody,
}

/// Message content; a message is either text or a button click, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationBody {
    Text { body: String },
    Button { text: String, payload: String },
}

impl NotificationEvent {
    /// Event for `message`, which belongs to `conversation`.
    pub fn from_message(message: &Message, conversation: &Conversation) -> Self {
        let body = match &message.payload {
            Some(payload) => NotificationBody::Button {
                text: message.message.clone(),
                payload: payload.clone(),
            },
            None => NotificationBody::Text {
                body: message.message.clone(),
            },
        };

        Self {
            event_id: message.id,
            conversation_phone: conversation.phone_number.clone(),
            conversation_external_id: conversation.phone_number_id.clone(),
            message_id: message.whatsapp_id.clone(),
            timestamp: message.timestamp,
            body,
        }
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Serialize)]
struct Envelope<'a> {
    object: &'static str,
    entry: [Entry<'a>; 1],
}

#[derive(Serialize)]
struct Entry<'a> {
    id: String,
    changes: [Change<'a>; 1],
}

#[derive(Serialize)]
struct Change<'a> {
    field: &'static str,
    value: ChangeValue<'a>,
}

#[derive(Serialize)]
struct ChangeValue<'a> {
    messaging_product: &'static str,
    metadata: Metadata<'a>,
    contacts: [Contact<'a>; 1],
    messages: [InboundMessage<'a>; 1],
}

#[derive(Serialize)]
struct Metadata<'a> {
    display_phone_number: &'a str,
    phone_number_id: &'a str,
}

#[derive(Serialize)]
struct Contact<'a> {
    profile: Profile,
    wa_id: &'a str,
}

#[derive(Serialize)]
struct Profile {
    name: &'static str,
}

#[derive(Serialize)]
struct InboundMessage<'a> {
    from: &'a str,
    id: &'a str,
    timestamp: String,
    #[serde(flatten)]
    content: Content<'a>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Content<'a> {
    Text { text: TextContent<'a> },
    Button { button: ButtonContent<'a> },
}

#[derive(Serialize)]
struct TextContent<'a> {
    body: &'a str,
}

#[derive(Serialize)]
struct ButtonContent<'a> {
    payload: &'a str,
    text: &'a str,
}

/// Serialize `event` into the webhook envelope.
pub fn build_payload(
    event: &NotificationEvent,
    settings: &PlatformSettings,
) -> Result<Vec<u8>, DeliveryError> {
    let content = match &event.body {
        NotificationBody::Text { body } => Content::Text {
            text: TextContent { body },
        },
        NotificationBody::Button { text, payload } => Content::Button {
            button: ButtonContent { payload, text },
        },
    };

    let envelope = Envelope {
        object: "whatsapp_business_account",
        entry: [Entry {
            id: event.event_id.to_string(),
            changes: [Change {
                field: "messages",
                value: ChangeValue {
                    messaging_product: "whatsapp",
                    metadata: Metadata {
                        display_phone_number: &settings.phone_number,
                        phone_number_id: &settings.phone_number_id,
                    },
                    contacts: [Contact {
                        profile: Profile {
                            name: CONTACT_NAME_PLACEHOLDER,
                        },
                        wa_id: &event.conversation_external_id,
                    }],
                    messages: [InboundMessage {
                        from: &event.conversation_phone,
                        id: &event.message_id,
                        timestamp: event.timestamp.to_string(),
                        content,
                    }],
                },
            }],
        }],
    };

    Ok(serde_json::to_vec(&envelope)?)
}

/// Payload bytes together with their signatures.
///
/// Built once per dispatch; every attempt and chaos round sends these exact
/// bytes.
#[derive(Debug, Clone)]
pub struct SignedPayload {
    pub bytes: Vec<u8>,
    pub signatures: SignatureSet,
}

impl SignedPayload {
    pub fn build(
        event: &NotificationEvent,
        settings: &PlatformSettings,
    ) -> Result<Self, DeliveryError> {
        let bytes = build_payload(event, settings)?;
        let signatures = signing::sign(&bytes, &settings.app_secret)?;
        Ok(Self { bytes, signatures })
    }
}
