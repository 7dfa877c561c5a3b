//! Message Event Source
//!
//! Customer messages fan out to the webhook (in the background) and to all
//! live sessions. Messages sent by the business only reach live sessions.

use tracing::{debug, error};
use wadev_common::{Conversation, Message};

use crate::webhooks::{NotificationEvent, NotifyMode, WebhookDispatcher};
use crate::ws::LiveBroadcaster;

#[derive(Debug, Clone)]
pub struct MessageEvents {
    dispatcher: WebhookDispatcher,
    broadcaster: LiveBroadcaster,
}

impl MessageEvents {
    pub const fn new(dispatcher: WebhookDispatcher, broadcaster: LiveBroadcaster) -> Self {
        Self {
            dispatcher,
            broadcaster,
        }
    }

    /// Announce a customer message that was just stored in `conversation`.
    ///
    /// The webhook receives it as an inbound message and live sessions get
    /// the same message.
    pub async fn message_created(&self, message: &Message, conversation: &Conversation) {
        let event = NotificationEvent::from_message(message, conversation);
        if let Err(e) = self.dispatcher.notify(event, NotifyMode::Background).await {
            error!(message_id = message.id, "Failed to schedule webhook: {}", e);
        }

        let sessions = self.broadcaster.send_message(message).await;
        debug!(message_id = message.id, sessions, "Message event published");
    }

    /// Announce a message the business sent through the Cloud API.
    ///
    /// Only live sessions see it; the webhook reports customer activity only.
    pub async fn business_message_sent(&self, message: &Message) {
        let sessions = self.broadcaster.send_message(message).await;
        debug!(message_id = message.id, sessions, "Business message published");
    }
}
