//! API Router and Application State
//!
//! Central routing configuration and shared state.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        StatusCode,
    },
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    chat,
    config::{Config, PlatformSettings, SettingsHandle},
    db::Store,
    events::MessageEvents,
    webhooks::{self, retry::ChaosPolicy, WebhookDispatcher},
    ws::{self, LiveBroadcaster},
};

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// In-memory conversations and templates
    pub store: Store,
    /// Mocked platform values, readable while the server runs
    pub settings: SettingsHandle,
    /// Outbound webhook delivery
    pub dispatcher: WebhookDispatcher,
    /// Live event sessions
    pub broadcaster: LiveBroadcaster,
    /// Fan-out of newly stored messages
    pub events: MessageEvents,
    /// Server configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state with the default chaos layer.
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        Self::with_chaos(config, ChaosPolicy::default())
    }

    /// Create new application state with a custom chaos layer.
    pub fn with_chaos(config: Config, chaos: ChaosPolicy) -> Result<Self, reqwest::Error> {
        let settings = SettingsHandle::new(config.platform.clone());
        let dispatcher = WebhookDispatcher::new(settings.clone())?.with_chaos(chaos);
        let broadcaster = LiveBroadcaster::new();
        let events = MessageEvents::new(dispatcher.clone(), broadcaster.clone());

        Ok(Self {
            store: Store::new(),
            settings,
            dispatcher,
            broadcaster,
            events,
            config: Arc::new(config),
        })
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut api_routes = Router::new()
        .route("/events", get(ws::handler))
        .route("/info", get(info))
        .route("/webhook/test", post(webhooks::handlers::test_webhook))
        .nest("/conversations", chat::conversations_router())
        .nest("/templates", chat::templates_router());

    if state.config.has_basic_auth() {
        api_routes = api_routes.layer(from_fn_with_state(state.clone(), require_basic_auth));
    }

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Dev UI API
        .nest("/api", api_routes)
        // Mocked Cloud API
        .merge(chat::graph_router())
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        // State
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    /// Service status
    status: &'static str,
    /// Number of connected live sessions
    live_sessions: usize,
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        live_sessions: state.broadcaster.session_count().await,
    })
}

/// GET /api/info
async fn info(State(state): State<AppState>) -> Json<PlatformSettings> {
    Json(state.settings.snapshot())
}

// ============================================================================
// Basic auth
// ============================================================================

/// Extract `(username, password)` from a `Basic` authorization header.
fn basic_credentials(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Middleware guarding the dev API when a username or password is configured.
pub async fn require_basic_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let expected_username = state.config.http_username.as_deref().unwrap_or_default();
    let expected_password = state.config.http_password.as_deref().unwrap_or_default();

    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(basic_credentials)
        .is_some_and(|(username, password)| {
            username == expected_username && password == expected_password
        });

    if authorized {
        next.run(request).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            [(WWW_AUTHENTICATE, "Basic realm=\"Restricted\"")],
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_credentials() {
        // "user:pa:ss"
        let header = "Basic dXNlcjpwYTpzcw==";
        assert_eq!(
            basic_credentials(header),
            Some(("user".to_string(), "pa:ss".to_string()))
        );
    }

    #[test]
    fn rejects_other_schemes() {
        assert_eq!(basic_credentials("Bearer dXNlcjpwYXNz"), None);
        assert_eq!(basic_credentials("Basic !!!"), None);
        // "nocolon"
        assert_eq!(basic_credentials("Basic bm9jb2xvbg=="), None);
    }
}
