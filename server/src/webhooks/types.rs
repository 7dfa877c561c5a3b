//! Webhook Types
//!
//! Error kinds produced while building, signing and delivering
//! notifications, and while validating the endpoint.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Failure of a single dispatch.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("cannot sign webhook payload: {0}")]
    SignatureInput(String),
    #[error("cannot encode webhook payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("webhook responded with status {status}")]
    NonSuccessStatus { status: u16 },
    #[error("webhook delivery failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<DeliveryError>,
    },
}

impl DeliveryError {
    /// Error from the final attempt, unwrapping `RetriesExhausted`.
    pub fn last_attempt(&self) -> &Self {
        match self {
            Self::RetriesExhausted { last, .. } => last.last_attempt(),
            other => other,
        }
    }
}

/// Failure of the subscription handshake.
#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("invalid webhook url: {0}")]
    InvalidUrl(String),
    #[error("webhook handshake request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("webhook did not return the expected challenge, expected: \"{expected}\", got: \"{received}\"")]
    Mismatch { expected: String, received: String },
}

/// Failure of the manual webhook test.
#[derive(Error, Debug)]
pub enum WebhookTestError {
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl IntoResponse for WebhookTestError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "Webhook test failed");
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}
