//! Reusable test helpers for HTTP integration tests.
//!
//! Provides `TestApp` for sending requests through the full axum router,
//! a local [`WebhookReceiver`] standing in for the developer's endpoint,
//! and [`spawn_test_server()`] for tests that need a real socket.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{self, HeaderMap, Method, Request, Response, StatusCode, Uri};
use axum::routing::any;
use axum::Router;
use http_body_util::BodyExt;
use tokio::task::JoinHandle;
use tower::ServiceExt;
use wadev_server::api::{create_router, AppState};
use wadev_server::config::Config;
use wadev_server::webhooks::retry::{ChaosPolicy, ChaosSource};

// ============================================================================
// Chaos sources
// ============================================================================

/// Never waits and never rolls an extra round.
#[derive(Debug, Default)]
pub struct QuietChaos;

impl ChaosSource for QuietChaos {
    fn delay_below(&self, _upper: Duration) -> Duration {
        Duration::ZERO
    }

    fn roll_percent(&self) -> u32 {
        99
    }
}

/// Never waits and always rolls every extra round.
#[derive(Debug, Default)]
pub struct EagerChaos;

impl ChaosSource for EagerChaos {
    fn delay_below(&self, _upper: Duration) -> Duration {
        Duration::ZERO
    }

    fn roll_percent(&self) -> u32 {
        0
    }
}

// ============================================================================
// Test App
// ============================================================================

/// A test application wrapping the full axum router.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Create a new test app with the test config and no chaos rounds.
    pub async fn new() -> Self {
        Self::with_config(Config::default_for_test()).await
    }

    /// Create a test app with a custom config.
    pub async fn with_config(config: Config) -> Self {
        Self::with_chaos(config, Arc::new(QuietChaos)).await
    }

    /// Create a test app with a custom chaos source.
    pub async fn with_chaos(config: Config, chaos: Arc<dyn ChaosSource>) -> Self {
        let state = AppState::with_chaos(config, ChaosPolicy::new(chaos))
            .expect("Failed to build app state");
        state.store.seed_default_template().await;
        let router = create_router(state.clone());

        Self { router, state }
    }

    /// Point the dispatcher at `url`.
    pub fn set_webhook_url(&self, url: &str) {
        let url = url.to_string();
        self.state.settings.update(move |s| s.webhook_url = url);
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// Build a JSON request.
    pub fn json_request(method: Method, uri: &str, body: &serde_json::Value) -> Request<Body> {
        Self::request(method, uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// Graph API bearer header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.state.settings.snapshot().graph_token)
    }
}

// ============================================================================
// Test Server
// ============================================================================

/// A running test server bound to a random port.
pub struct TestServer {
    /// Server address (127.0.0.1:PORT).
    pub addr: SocketAddr,
    /// Base URL for HTTP requests (e.g., `http://127.0.0.1:12345`).
    pub url: String,
    /// Handle to the server task for cleanup.
    _handle: JoinHandle<()>,
}

/// Spawn a real HTTP server on a random port.
pub async fn spawn_test_server(router: Router) -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local addr");
    let url = format!("http://{addr}");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("Test server failed");
    });

    TestServer {
        addr,
        url,
        _handle: handle,
    }
}

// ============================================================================
// Webhook receiver
// ============================================================================

/// One request seen by the receiver.
#[derive(Debug, Clone)]
pub struct ReceivedCall {
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ReceivedCall {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("webhook body is not JSON")
    }
}

#[derive(Clone, Default)]
struct ReceiverState {
    calls: Arc<Mutex<Vec<ReceivedCall>>>,
    /// Statuses for upcoming POSTs; 200 once empty.
    statuses: Arc<Mutex<VecDeque<StatusCode>>>,
    /// Body returned to handshakes instead of the challenge.
    wrong_challenge: Arc<Mutex<Option<String>>>,
}

/// Local stand-in for the developer's webhook endpoint.
pub struct WebhookReceiver {
    state: ReceiverState,
    /// Full webhook URL (`http://127.0.0.1:PORT/webhook`).
    pub url: String,
    _server: TestServer,
}

async fn receive(
    State(state): State<ReceiverState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let query = uri
        .query()
        .map(|q| {
            reqwest::Url::parse(&format!("http://receiver/?{q}"))
                .expect("valid query")
                .query_pairs()
                .into_owned()
                .collect()
        })
        .unwrap_or_default();
    let call = ReceivedCall {
        method: method.clone(),
        query,
        headers,
        body,
    };

    let response = if method == Method::GET {
        let wrong = state.wrong_challenge.lock().unwrap().clone();
        let body = wrong.unwrap_or_else(|| call.query_value("hub.challenge").unwrap_or("").into());
        (StatusCode::OK, body)
    } else {
        let status = state
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(StatusCode::OK);
        (status, String::new())
    };

    state.calls.lock().unwrap().push(call);
    response
}

impl WebhookReceiver {
    pub async fn start() -> Self {
        let state = ReceiverState::default();
        let router = Router::new()
            .route("/webhook", any(receive))
            .with_state(state.clone());
        let server = spawn_test_server(router).await;

        Self {
            state,
            url: format!("{}/webhook", server.url),
            _server: server,
        }
    }

    /// Answer the next POSTs with these statuses.
    pub fn respond_with(&self, statuses: &[StatusCode]) {
        self.state.statuses.lock().unwrap().extend(statuses);
    }

    /// Echo `body` to handshakes instead of the challenge.
    pub fn echo_wrong_challenge(&self, body: &str) {
        *self.state.wrong_challenge.lock().unwrap() = Some(body.to_string());
    }

    pub fn calls(&self) -> Vec<ReceivedCall> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn posts(&self) -> Vec<ReceivedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == Method::POST)
            .collect()
    }

    /// Wait until at least `count` POSTs arrived.
    pub async fn wait_for_posts(&self, count: usize) -> Vec<ReceivedCall> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let posts = self.posts();
            if posts.len() >= count {
                return posts;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "expected {count} webhook posts, got {}",
                posts.len()
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

// ============================================================================
// Response helpers
// ============================================================================

pub async fn body_to_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        let preview = String::from_utf8_lossy(&bytes);
        panic!("Failed to parse response as JSON: {e}\nBody: {preview}")
    })
}
