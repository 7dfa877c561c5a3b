//! Webhook Event Dispatch
//!
//! Sends notifications to the configured webhook URL and performs the
//! subscription handshake.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tracing::{debug, error, info, instrument, warn};

use super::payload::{NotificationEvent, SignedPayload};
use super::retry::ChaosPolicy;
use super::types::{DeliveryError, HandshakeError};
use crate::config::SettingsHandle;
use crate::util;

/// Per-request timeout for deliveries and the handshake.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent the real platform's webhook crawler identifies with.
pub const USER_AGENT: &str = "facebookexternalua";

/// How the caller waits for a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyMode {
    /// Detach the delivery; failures are only logged.
    Background,
    /// Run the full delivery and return its outcome.
    AwaitResult,
}

/// Delivers notifications to the developer's webhook endpoint.
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
    settings: SettingsHandle,
    chaos: ChaosPolicy,
}

impl WebhookDispatcher {
    pub fn new(settings: SettingsHandle) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            settings,
            chaos: ChaosPolicy::default(),
        })
    }

    /// Replace the chaos policy (tests script the randomness).
    #[must_use]
    pub fn with_chaos(mut self, chaos: ChaosPolicy) -> Self {
        self.chaos = chaos;
        self
    }

    /// Dispatch `event` to the webhook.
    ///
    /// In [`NotifyMode::Background`] this returns immediately and always
    /// succeeds; the outcome is logged by the detached task.
    pub async fn notify(
        &self,
        event: NotificationEvent,
        mode: NotifyMode,
    ) -> Result<(), DeliveryError> {
        match mode {
            NotifyMode::AwaitResult => self.deliver(&event).await,
            NotifyMode::Background => {
                self.spawn_delivery(event);
                Ok(())
            }
        }
    }

    fn spawn_delivery(&self, event: NotificationEvent) {
        let dispatcher = self.clone();
        let event_id = event.event_id;

        // Panic-catching wrapper
        tokio::spawn(async move {
            let handle = tokio::spawn(async move {
                if let Err(e) = dispatcher.deliver(&event).await {
                    error!(
                        event_id,
                        message_id = %event.message_id,
                        "Failed to call webhook: {}", e
                    );
                }
            });
            if let Err(e) = handle.await {
                error!(event_id, "Webhook delivery task panicked: {}", e);
            }
        });
    }

    /// Sign once, then run every attempt of every chaos round with the same bytes.
    #[instrument(skip(self, event), fields(event_id = event.event_id))]
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), DeliveryError> {
        let signed = SignedPayload::build(event, &self.settings.snapshot())?;
        let rounds = self
            .chaos
            .run(|attempt| self.send_once(&signed, attempt))
            .await?;
        debug!(rounds, "Webhook delivered");
        Ok(())
    }

    async fn send_once(&self, signed: &SignedPayload, attempt: u32) -> Result<(), DeliveryError> {
        let url = self.settings.snapshot().webhook_url;

        if attempt == 1 {
            info!(url = %url, "Calling webhook");
        } else {
            info!(url = %url, attempt, "Retrying webhook");
        }

        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json");
        for (name, value) in signed.signatures.headers() {
            request = request.header(name, value);
        }

        let resp = request.body(signed.bytes.clone()).send().await?;
        let status = resp.status();
        if status.as_u16() < 400 {
            Ok(())
        } else {
            Err(DeliveryError::NonSuccessStatus {
                status: status.as_u16(),
            })
        }
    }

    /// Challenge the webhook endpoint the way the platform does when a
    /// subscription is registered.
    ///
    /// Succeeds only if the response body is exactly the challenge.
    #[instrument(skip(self))]
    pub async fn validate_handshake(&self) -> Result<(), HandshakeError> {
        let settings = self.settings.snapshot();
        let mut url = reqwest::Url::parse(&settings.webhook_url)
            .map_err(|e| HandshakeError::InvalidUrl(e.to_string()))?;

        let challenge = util::random_hex(&mut rand::thread_rng(), 16);
        url.query_pairs_mut()
            .append_pair("hub.mode", "subscribe")
            .append_pair("hub.verify_token", &settings.webhook_verify_token)
            .append_pair("hub.challenge", &challenge);

        let body = self.client.get(url).send().await?.text().await?;
        check_challenge(challenge, body)?;

        info!("Webhook handshake succeeded");
        Ok(())
    }

    /// Handshake run at startup; failures are logged and never fatal.
    pub async fn validate_on_startup(&self) {
        if let Err(e) = self.validate_handshake().await {
            warn!(error = %e, "Webhook handshake failed");
        }
    }
}

/// Byte-for-byte comparison of the echoed challenge.
fn check_challenge(expected: String, received: String) -> Result<(), HandshakeError> {
    if received == expected {
        Ok(())
    } else {
        Err(HandshakeError::Mismatch { expected, received })
    }
}
