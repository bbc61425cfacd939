//! Conversation surface: a fallible remote backend with deterministic local
//! fallbacks, and the durable per-session history with its summary archive.

mod engine;
mod history;

pub use engine::{ChatBackend, ChatEngine};
pub use history::{ChatMessage, ChatSummaryEntry, ConversationLog, Role};
