//! Store Queries

use chrono::Utc;
use tracing::info;
use wadev_common::{
    Conversation, Message, MessageButton, NewMessage, Template, TemplateCustomButton,
    TemplateInput,
};

use super::{next, Store, StoreError, Tables};

/// Name of the template seeded into an empty store.
pub const DEFAULT_TEMPLATE_NAME: &str = "hello_world";

const DEFAULT_TEMPLATE_BODY: &str = "Welcome and congratulations!! This message demonstrates your \
ability to send a WhatsApp message notification from the Cloud API, hosted by wadev. Thank you \
for taking the time to test with us.";

/// Turn `new` into a stored message of `conversation`.
fn materialize(tables: &mut Tables, conversation_id: u64, new: NewMessage) -> Message {
    let message_id = next(&mut tables.seq.message);
    let buttons = new
        .buttons
        .into_iter()
        .map(|b| MessageButton {
            id: next(&mut tables.seq.message_button),
            conversation_id,
            message_id,
            text: b.text,
            payload: b.payload,
        })
        .collect();

    Message {
        id: message_id,
        conversation_id,
        whatsapp_id: new.whatsapp_id,
        direction: new.direction,
        header_message: new.header_message,
        message: new.message,
        footer_message: new.footer_message,
        timestamp: new.timestamp,
        payload: new.payload,
        buttons,
        created_at: Utc::now(),
    }
}

fn template_buttons(
    tables: &mut Tables,
    template_id: u64,
    input: &TemplateInput,
) -> Vec<TemplateCustomButton> {
    input
        .template_custom_buttons
        .iter()
        .map(|b| TemplateCustomButton {
            id: next(&mut tables.seq.template_button),
            template_id,
            text: b.text.clone(),
        })
        .collect()
}

impl Store {
    // ========================================================================
    // Conversations & messages
    // ========================================================================

    /// All conversations with messages, oldest first.
    pub async fn list_conversations(&self) -> Vec<Conversation> {
        self.tables
            .read()
            .await
            .conversations
            .values()
            .cloned()
            .collect()
    }

    pub async fn find_conversation(&self, id: u64) -> Option<Conversation> {
        self.tables.read().await.conversations.get(&id).cloned()
    }

    pub async fn find_conversation_by_phone(&self, phone_number: &str) -> Option<Conversation> {
        self.tables
            .read()
            .await
            .conversations
            .values()
            .find(|c| c.phone_number == phone_number)
            .cloned()
    }

    /// Append `new` to the conversation with `phone_number`, starting one if
    /// none exists. Returns the conversation after the append and the stored
    /// message.
    pub async fn create_or_append(
        &self,
        phone_number: &str,
        new: NewMessage,
    ) -> (Conversation, Message) {
        let mut tables = self.tables.write().await;

        let existing = tables
            .conversations
            .values()
            .find(|c| c.phone_number == phone_number)
            .map(|c| c.id);

        let conversation_id = existing.unwrap_or_else(|| next(&mut tables.seq.conversation));
        let message = materialize(&mut tables, conversation_id, new);

        let conversation = tables
            .conversations
            .entry(conversation_id)
            .or_insert_with(|| {
                info!(conversation_id, "Conversation started");
                Conversation {
                    id: conversation_id,
                    phone_number_id: phone_number.to_string(),
                    phone_number: phone_number.to_string(),
                    messages: Vec::new(),
                    created_at: Utc::now(),
                }
            });
        conversation.messages.push(message.clone());
        (conversation.clone(), message)
    }

    /// Append `new` to an existing conversation.
    pub async fn insert_message(
        &self,
        conversation_id: u64,
        new: NewMessage,
    ) -> Result<(Conversation, Message), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.conversations.contains_key(&conversation_id) {
            return Err(StoreError::ConversationNotFound(conversation_id));
        }

        let message = materialize(&mut tables, conversation_id, new);
        let conversation = tables
            .conversations
            .get_mut(&conversation_id)
            .ok_or(StoreError::ConversationNotFound(conversation_id))?;
        conversation.messages.push(message.clone());
        Ok((conversation.clone(), message))
    }

    /// Button `button_id` on any message of conversation `conversation_id`.
    pub async fn find_button(&self, conversation_id: u64, button_id: u64) -> Option<MessageButton> {
        self.tables
            .read()
            .await
            .conversations
            .get(&conversation_id)?
            .messages
            .iter()
            .flat_map(|m| m.buttons.iter())
            .find(|b| b.id == button_id)
            .cloned()
    }

    /// Most recently stored message with its conversation.
    pub async fn latest_message(&self) -> Option<(Message, Conversation)> {
        let tables = self.tables.read().await;
        tables
            .conversations
            .values()
            .flat_map(|c| c.messages.iter().map(move |m| (m, c)))
            .max_by_key(|(m, _)| m.id)
            .map(|(m, c)| (m.clone(), c.clone()))
    }

    // ========================================================================
    // Templates
    // ========================================================================

    pub async fn list_templates(&self) -> Vec<Template> {
        self.tables
            .read()
            .await
            .templates
            .values()
            .cloned()
            .collect()
    }

    pub async fn find_template_by_name(&self, name: &str) -> Option<Template> {
        self.tables
            .read()
            .await
            .templates
            .values()
            .find(|t| t.name == name)
            .cloned()
    }

    pub async fn create_template(&self, input: TemplateInput) -> Template {
        let mut tables = self.tables.write().await;
        let id = next(&mut tables.seq.template);
        let buttons = template_buttons(&mut tables, id, &input);
        let template = Template {
            id,
            name: input.name,
            header: input.header,
            body: input.body,
            footer: input.footer,
            template_custom_buttons: buttons,
            created_at: Utc::now(),
        };
        tables.templates.insert(id, template.clone());
        template
    }

    /// Overwrite the fields of template `id`; its buttons are replaced.
    pub async fn update_template(
        &self,
        id: u64,
        input: TemplateInput,
    ) -> Result<Template, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.templates.contains_key(&id) {
            return Err(StoreError::TemplateNotFound(id));
        }

        let buttons = template_buttons(&mut tables, id, &input);
        let template = tables
            .templates
            .get_mut(&id)
            .ok_or(StoreError::TemplateNotFound(id))?;
        template.name = input.name;
        template.header = input.header;
        template.body = input.body;
        template.footer = input.footer;
        template.template_custom_buttons = buttons;
        Ok(template.clone())
    }

    pub async fn delete_template(&self, id: u64) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .templates
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::TemplateNotFound(id))
    }

    /// Create the `hello_world` template when no template exists yet.
    ///
    /// Returns whether it was created.
    pub async fn seed_default_template(&self) -> bool {
        if !self.tables.read().await.templates.is_empty() {
            return false;
        }

        self.create_template(TemplateInput {
            name: DEFAULT_TEMPLATE_NAME.into(),
            header: Some("Hello World".into()),
            body: DEFAULT_TEMPLATE_BODY.into(),
            footer: Some("WhatsApp dev sample message".into()),
            template_custom_buttons: Vec::new(),
        })
        .await;
        info!(name = DEFAULT_TEMPLATE_NAME, "Seeded default template");
        true
    }
}
