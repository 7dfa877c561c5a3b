//! Webhook Dispatcher
//!
//! Delivery of platform events to the developer's webhook endpoint with
//! HMAC signing, bounded retries and chaos re-deliveries, plus the
//! subscription handshake.

pub mod dispatch;
pub mod handlers;
pub mod payload;
pub mod retry;
pub mod signing;
pub mod types;

pub use dispatch::{NotifyMode, WebhookDispatcher};
pub use payload::{NotificationBody, NotificationEvent};
pub use types::{DeliveryError, HandshakeError};
