//! Chat Service
//!
//! Conversations and templates for the dev UI, and the mocked Cloud API
//! endpoint businesses send messages through.

mod conversations;
pub mod graph;
pub mod phone;
pub mod templates;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::json;
use thiserror::Error;

use crate::api::AppState;
use crate::db::StoreError;

/// Errors returned by the dev API.
///
/// All of them are reported as `400 {"error": "..."}`.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Phone(#[from] phone::PhoneError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Body(#[from] JsonRejection),
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Create conversations router.
pub fn conversations_router() -> Router<AppState> {
    Router::new()
        .route("/", get(conversations::index).post(conversations::create))
        .route("/{id}", post(conversations::create_message))
        .route(
            "/{id}/btnQuickReply/{btn_id}",
            post(conversations::btn_quick_reply),
        )
}

/// Create templates router.
pub fn templates_router() -> Router<AppState> {
    Router::new()
        .route("/", get(templates::index).post(templates::create))
        .route(
            "/{id}",
            patch(templates::update).delete(templates::delete),
        )
}

/// Create the mocked Cloud API router (mounted at the root).
pub fn graph_router() -> Router<AppState> {
    Router::new().route(
        "/{version}/{phone_number_id}/messages",
        post(graph::send_message),
    )
}
