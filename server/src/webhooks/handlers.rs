//! Webhook API Handlers

use axum::extract::State;
use axum::Json;
use tracing::{info, instrument};

use super::dispatch::NotifyMode;
use super::payload::NotificationEvent;
use super::types::WebhookTestError;
use crate::api::AppState;

/// POST /api/webhook/test
///
/// Runs the subscription handshake, then re-delivers the most recently
/// stored message and waits for the outcome.
#[instrument(skip(state))]
pub async fn test_webhook(State(state): State<AppState>) -> Result<Json<bool>, WebhookTestError> {
    state.dispatcher.validate_handshake().await?;

    let Some((message, conversation)) = state.store.latest_message().await else {
        info!("No stored message to send, handshake only");
        return Ok(Json(true));
    };

    state
        .dispatcher
        .notify(
            NotificationEvent::from_message(&message, &conversation),
            NotifyMode::AwaitResult,
        )
        .await?;

    info!(message_id = message.id, "Test webhook delivered");
    Ok(Json(true))
}
