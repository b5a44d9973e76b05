//! # chatterbox-bot
//!
//! Everything that decides what the assistant says:
//! - **Knowledge base** of taught answers, backed by the store
//! - **Lookup adapters** for weather, encyclopedia, news, translation,
//!   task webhooks and the clock; each one always returns a printable reply
//! - **Language-model client** for an optional OpenAI-compatible backend
//! - **Responder** tying them together in a fixed priority order

pub mod error;
pub mod intents;
pub mod knowledge;
pub mod llm;
pub mod lookups;
pub mod responder;

pub use error::{BotError, LookupError};
pub use knowledge::KnowledgeBase;
pub use llm::{LlmClient, LlmConfig};
pub use lookups::{LookupConfig, Lookups};
pub use responder::{ReplyContext, Responder};
