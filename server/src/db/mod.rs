//! Storage Layer
//!
//! In-memory store for conversations, messages and templates. Ids are
//! assigned from per-table counters starting at 1, so insertion order and id
//! order agree.

mod queries;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use wadev_common::{Conversation, Template};

pub use queries::DEFAULT_TEMPLATE_NAME;

/// Store errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("conversation {0} not found")]
    ConversationNotFound(u64),
    #[error("template {0} not found")]
    TemplateNotFound(u64),
}

/// Monotonic id counters, one per table.
#[derive(Debug, Default)]
struct Sequences {
    conversation: u64,
    message: u64,
    message_button: u64,
    template: u64,
    template_button: u64,
}

fn next(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

#[derive(Debug, Default)]
struct Tables {
    /// Conversations with their messages (and the messages' buttons) inline.
    conversations: BTreeMap<u64, Conversation>,
    templates: BTreeMap<u64, Template>,
    seq: Sequences,
}

/// Shared handle to the in-memory tables.
#[derive(Debug, Clone, Default)]
pub struct Store {
    tables: Arc<RwLock<Tables>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }
}
