//! Conversation Handlers
//!
//! The dev UI plays the customer: messages created here are outgoing from
//! the customer's phone and are announced to the business webhook.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use tracing::{info, instrument};
use wadev_common::{Conversation, Direction, NewMessage};

use super::{phone, ChatError};
use crate::api::AppState;
use crate::db::StoreError;
use crate::util::unix_now;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    #[serde(default, alias = "Message")]
    pub message: String,
}

fn require_message(message: &str) -> Result<(), ChatError> {
    if message.is_empty() {
        return Err(ChatError::Validation("missing message".into()));
    }
    Ok(())
}

fn check_conversation_id(id: u64) -> Result<u64, ChatError> {
    if id == 0 {
        return Err(ChatError::Validation("invalid conversation id".into()));
    }
    Ok(id)
}

/// GET /api/conversations
pub async fn index(State(state): State<AppState>) -> Json<Vec<Conversation>> {
    Json(state.store.list_conversations().await)
}

/// POST /api/conversations
#[instrument(skip(state, body))]
pub async fn create(
    State(state): State<AppState>,
    body: Result<Json<CreateConversationRequest>, JsonRejection>,
) -> Result<Json<Conversation>, ChatError> {
    let Json(req) = body?;
    if req.phone_number.is_empty() {
        return Err(ChatError::Validation("missing phone number".into()));
    }
    require_message(&req.message)?;

    let parsed = phone::parse(&req.phone_number, true)?;
    let new = NewMessage::text(
        parsed.whatsapp_message_id,
        Direction::Outgoing,
        req.message,
        unix_now(),
    );
    let (conversation, message) = state.store.create_or_append(&parsed.parsed, new).await;
    info!(
        conversation_id = conversation.id,
        message_id = message.id,
        "Customer message created"
    );

    state.events.message_created(&message, &conversation).await;
    Ok(Json(conversation))
}

/// POST /api/conversations/{id}
#[instrument(skip(state, body))]
pub async fn create_message(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    body: Result<Json<CreateMessageRequest>, JsonRejection>,
) -> Result<Json<Conversation>, ChatError> {
    let id = check_conversation_id(id)?;
    let Json(req) = body?;
    require_message(&req.message)?;

    let existing = state
        .store
        .find_conversation(id)
        .await
        .ok_or(StoreError::ConversationNotFound(id))?;

    let new = NewMessage::text(
        phone::whatsapp_id(&existing.phone_number),
        Direction::Outgoing,
        req.message,
        unix_now(),
    );
    let (conversation, message) = state.store.insert_message(id, new).await?;

    state.events.message_created(&message, &conversation).await;
    Ok(Json(conversation))
}

/// POST /api/conversations/{id}/btnQuickReply/{btn_id}
///
/// The customer taps a quick-reply button of a message in the conversation.
/// The reply carries the button's text and payload, which makes the webhook
/// report it as a button event.
#[instrument(skip(state))]
pub async fn btn_quick_reply(
    State(state): State<AppState>,
    Path((id, btn_id)): Path<(u64, u64)>,
) -> Result<Json<Conversation>, ChatError> {
    let id = check_conversation_id(id)?;
    let existing = state
        .store
        .find_conversation(id)
        .await
        .ok_or(StoreError::ConversationNotFound(id))?;
    let button = state
        .store
        .find_button(id, btn_id)
        .await
        .ok_or_else(|| ChatError::Validation(format!("button {btn_id} not found")))?;

    let payload = button.payload.unwrap_or_else(|| button.text.clone());
    let mut new = NewMessage::text(
        phone::whatsapp_id(&existing.phone_number),
        Direction::Outgoing,
        button.text,
        unix_now(),
    );
    new.payload = Some(payload);

    let (conversation, message) = state.store.insert_message(id, new).await?;
    info!(conversation_id = id, button_id = btn_id, "Quick reply sent");

    state.events.message_created(&message, &conversation).await;
    Ok(Json(conversation))
}
