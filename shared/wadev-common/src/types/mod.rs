//! Shared Types

mod conversation;
mod template;

pub use conversation::*;
pub use template::*;
