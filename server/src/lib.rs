//! wadev Server
//!
//! Local stand-in for a messaging platform's Cloud API. Businesses send
//! messages through the mocked Graph endpoint, the dev UI plays the
//! customer, and every stored message is delivered to the developer's
//! webhook with platform-style signatures and retries.

pub mod api;
pub mod chat;
pub mod config;
pub mod db;
pub mod events;
pub mod util;
pub mod webhooks;
pub mod ws;
