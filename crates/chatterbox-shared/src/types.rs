use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Conversation identifier: `chat-<UTC timestamp with millis>-<4 hex digits>`.
///
/// The timestamp part orders ids by creation; the suffix keeps two chats
/// started in the same millisecond apart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn generate() -> Self {
        let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
        let suffix: u16 = rand::thread_rng().gen();
        Self(format!("chat-{stamp}-{suffix:04x}"))
    }

    /// Accept a client-supplied id if it is non-empty and free of
    /// characters that have no business in an identifier.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.len() > 64 {
            return None;
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_shape() {
        let id = ConversationId::generate();
        assert!(id.as_str().starts_with("chat-"));
        // chat- + 17 digit stamp + - + 4 hex
        assert_eq!(id.as_str().len(), 5 + 17 + 1 + 4);
        assert!(ConversationId::parse(id.as_str()).is_some());
    }

    #[test]
    fn test_parse_rejects_junk() {
        assert!(ConversationId::parse("").is_none());
        assert!(ConversationId::parse("   ").is_none());
        assert!(ConversationId::parse("../etc/passwd").is_none());
        assert!(ConversationId::parse("a b").is_none());
        assert_eq!(
            ConversationId::parse(" 1713139200000 ").unwrap().as_str(),
            "1713139200000"
        );
    }
}
