//! wadev Common Library
//!
//! Entities shared by the store, the HTTP layer, the webhook engine and the
//! live event protocol.

pub mod protocol;
pub mod types;

pub use protocol::LiveEvent;
pub use types::*;
