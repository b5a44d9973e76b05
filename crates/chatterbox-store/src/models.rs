//! Domain model structs persisted in the SQLite database.
//!
//! Structs that leave the server as JSON derive `Serialize` with camelCase
//! field names, which is what the browser client reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered account. `password_hash` never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub notifications_enabled: bool,
    /// Reference (URL or stored file name) of the profile picture.
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The editable, public part of a [`User`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub notifications_enabled: bool,
    pub profile_picture: Option<String>,
}

impl From<&User> for Profile {
    fn from(user: &User) -> Self {
        Self {
            display_name: user.display_name.clone(),
            email: user.email.clone(),
            notifications_enabled: user.notifications_enabled,
            profile_picture: user.profile_picture.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// A conversation owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(rename = "chatId")]
    pub id: String,
    #[serde(skip)]
    pub username: String,
    /// First user message of the conversation, shortened.
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single chat message, as returned by history queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    /// `true` when the user sent it, `false` for the assistant's reply.
    pub is_user: bool,
}

// ---------------------------------------------------------------------------
// Knowledge
// ---------------------------------------------------------------------------

/// A learned topic and its answers in the order they were taught.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnowledgeEntry {
    pub topic: String,
    pub answers: Vec<String>,
}
