//! Server Configuration
//!
//! Loads configuration from environment variables and derives the mocked
//! platform credentials from a secrets seed when they are not set explicitly.

use std::env;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::util;

/// Seed used when `SECRETS_SEED` is not set.
pub const FALLBACK_SECRETS_SEED: &str = "fallback-secrets-seed";

/// Default listen address.
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:1090";

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:1090")
    pub bind_address: String,

    /// Basic auth username for the dev API (optional)
    pub http_username: Option<String>,

    /// Basic auth password for the dev API (optional)
    pub http_password: Option<String>,

    /// Mocked platform values, shared with the webhook dispatcher
    pub platform: PlatformSettings,
}

/// Mocked platform values read by the dispatcher and the HTTP handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformSettings {
    #[serde(rename = "webhookURL")]
    pub webhook_url: String,
    #[serde(rename = "webhookVerifyToken")]
    pub webhook_verify_token: String,
    /// HMAC key for webhook signatures
    #[serde(rename = "appSecret")]
    pub app_secret: String,
    /// Display phone number reported in webhook metadata
    #[serde(rename = "phoneNumber")]
    pub phone_number: String,
    #[serde(rename = "phoneNumberID")]
    pub phone_number_id: String,
    /// Bearer token accepted by the mock Graph API
    #[serde(rename = "graphToken")]
    pub graph_token: String,
}

/// Values generated from the secrets seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeededValues {
    pub phone_number: String,
    pub phone_number_id: String,
    pub graph_token: String,
    pub app_secret: String,
    pub webhook_verify_token: String,
}

impl SeededValues {
    /// Derive the values deterministically from `seed`.
    pub fn derive(seed: &str) -> Self {
        let digest = Sha256::digest(seed.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let mut rng = StdRng::seed_from_u64(u64::from_be_bytes(head));

        Self {
            phone_number: format!("31{}", util::random_digits(&mut rng, 8)),
            phone_number_id: util::random_digits(&mut rng, 15),
            graph_token: util::random_base64(&mut rng, 172),
            app_secret: util::random_hex(&mut rng, 16),
            webhook_verify_token: util::random_hex(&mut rng, 16),
        }
    }
}

/// Shared, lock-guarded access to [`PlatformSettings`].
///
/// Readers take a cheap clone so no lock is held across an await point.
#[derive(Debug, Clone)]
pub struct SettingsHandle(Arc<RwLock<PlatformSettings>>);

impl SettingsHandle {
    pub fn new(settings: PlatformSettings) -> Self {
        Self(Arc::new(RwLock::new(settings)))
    }

    /// Copy of the current settings.
    pub fn snapshot(&self) -> PlatformSettings {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Mutate the settings in place.
    pub fn update(&self, f: impl FnOnce(&mut PlatformSettings)) {
        let mut guard = self.0.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}

/// Read a trimmed, non-empty environment variable.
fn var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Expand `:PORT` shorthand to all interfaces.
fn normalize_bind_address(addr: String) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let webhook_url = var("WEBHOOK_URL").context(
            "WEBHOOK_URL must be set to the endpoint that receives webhook notifications",
        )?;
        reqwest::Url::parse(&webhook_url)
            .with_context(|| format!("Invalid webhook url: {webhook_url}"))?;

        let seed = var("SECRETS_SEED").unwrap_or_else(|| {
            warn!(
                "DANGER: using fallback secrets seed, not recommended when exposing this service \
                 to the internet; set $SECRETS_SEED to a custom seed"
            );
            FALLBACK_SECRETS_SEED.into()
        });
        let seeded = SeededValues::derive(&seed);

        Ok(Self {
            bind_address: normalize_bind_address(
                var("HTTP_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.into()),
            ),
            http_username: var("HTTP_USERNAME"),
            http_password: var("HTTP_PASSWORD"),
            platform: PlatformSettings {
                webhook_url,
                webhook_verify_token: var("WEBHOOK_VERIFY_TOKEN")
                    .or_else(|| var("WEBHOOK"))
                    .unwrap_or(seeded.webhook_verify_token),
                app_secret: var("FACEBOOK_APP_SECRET").unwrap_or(seeded.app_secret),
                phone_number: var("WHATSAPP_PHONE_NUMBER").unwrap_or(seeded.phone_number),
                phone_number_id: var("WHATSAPP_PHONE_NUMBER_ID")
                    .unwrap_or(seeded.phone_number_id),
                graph_token: var("FACEBOOK_GRAPH_TOKEN").unwrap_or(seeded.graph_token),
            },
        })
    }

    /// Whether the dev API is protected with basic auth.
    #[must_use]
    pub const fn has_basic_auth(&self) -> bool {
        self.http_username.is_some() || self.http_password.is_some()
    }

    /// Create a default configuration for testing.
    ///
    /// The webhook URL points at a closed local port; tests that exercise
    /// delivery override it with their own receiver.
    #[must_use]
    pub fn default_for_test() -> Self {
        let seeded = SeededValues::derive("test-secrets-seed");
        Self {
            bind_address: "127.0.0.1:1090".into(),
            http_username: None,
            http_password: None,
            platform: PlatformSettings {
                webhook_url: "http://127.0.0.1:9/webhook".into(),
                webhook_verify_token: seeded.webhook_verify_token,
                app_secret: seeded.app_secret,
                phone_number: seeded.phone_number,
                phone_number_id: seeded.phone_number_id,
                graph_token: seeded.graph_token,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_values_are_deterministic() {
        let a = SeededValues::derive("seed-one");
        let b = SeededValues::derive("seed-one");
        let c = SeededValues::derive("seed-two");

        assert_eq!(a, b);
        assert_ne!(a.app_secret, c.app_secret);
    }

    #[test]
    fn seeded_values_have_expected_shapes() {
        let values = SeededValues::derive(FALLBACK_SECRETS_SEED);

        assert_eq!(values.phone_number.len(), 10);
        assert!(values.phone_number.starts_with("31"));
        assert!(values.phone_number.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(values.phone_number_id.len(), 15);
        assert_eq!(values.app_secret.len(), 32);
        assert_eq!(values.webhook_verify_token.len(), 32);
        // 172 bytes -> 232 base64 chars including padding
        assert_eq!(values.graph_token.len(), 232);
    }

    #[test]
    fn port_only_bind_address() {
        assert_eq!(normalize_bind_address(":1090".into()), "0.0.0.0:1090");
        assert_eq!(normalize_bind_address("127.0.0.1:80".into()), "127.0.0.1:80");
    }

    #[test]
    fn settings_handle_update_is_visible_to_clones() {
        let handle = SettingsHandle::new(Config::default_for_test().platform);
        let other = handle.clone();

        handle.update(|s| s.webhook_url = "http://example.test/hook".into());

        assert_eq!(other.snapshot().webhook_url, "http://example.test/hook");
    }

    #[test]
    fn info_field_names() {
        let json = serde_json::to_value(Config::default_for_test().platform).unwrap();
        for key in [
            "graphToken",
            "appSecret",
            "phoneNumber",
            "phoneNumberID",
            "webhookURL",
            "webhookVerifyToken",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }
}
