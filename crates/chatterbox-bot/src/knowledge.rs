//! Knowledge base of taught answers.
//!
//! A topic key is derived from a question by dropping everything after the
//! first `?`, collapsing every run of non-word characters to one space and
//! lowercasing. Incoming messages are normalized the same way before lookup,
//! so "What is X?" taught once answers "what is x" later.
//!
//! Each call opens its own store connection on a blocking thread.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use chatterbox_store::Database;

use crate::error::BotError;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w]+").expect("valid regex"));

/// Topic key for a question.
pub fn topic_key(question: &str) -> String {
    let head = question.split('?').next().unwrap_or_default();
    NON_WORD
        .replace_all(&head.to_lowercase(), " ")
        .trim()
        .to_string()
}

/// Store-backed knowledge base.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    db_path: PathBuf,
}

impl KnowledgeBase {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    /// First stored answer whose topic occurs in `message`.
    pub async fn lookup(&self, message: &str) -> Result<Option<String>, BotError> {
        let key = topic_key(message);
        if key.is_empty() {
            return Ok(None);
        }
        self.with_db(move |db| Ok(db.first_matching_answer(&key)?))
            .await
    }

    /// Append `answer` to the topic derived from `question`.
    ///
    /// Teaching the same answer twice stores it twice.
    pub async fn learn(&self, question: &str, answer: &str) -> Result<String, BotError> {
        let key = topic_key(question);
        let answer = answer.trim().to_string();
        if key.is_empty() {
            return Err(BotError::Invalid("question has no words".into()));
        }
        if answer.is_empty() {
            return Err(BotError::Invalid("answer is empty".into()));
        }

        let topic = key.clone();
        self.with_db(move |db| Ok(db.insert_knowledge(&topic, &answer)?))
            .await?;
        info!(topic = %key, "learned new answer");
        Ok(key)
    }

    /// Every known topic key, in first-learned order.
    pub async fn topics(&self) -> Result<Vec<String>, BotError> {
        let entries = self.with_db(|db| Ok(db.knowledge_entries()?)).await?;
        Ok(entries.into_iter().map(|e| e.topic).collect())
    }

    /// The whole knowledge base as `topic -> answers`, the shape of the
    /// JSON side file.
    pub async fn export(&self) -> Result<BTreeMap<String, Vec<String>>, BotError> {
        let entries = self.with_db(|db| Ok(db.knowledge_entries()?)).await?;
        Ok(entries.into_iter().map(|e| (e.topic, e.answers)).collect())
    }

    /// Append every answer of `map`. Keys are normalized on the way in.
    pub async fn import(&self, map: BTreeMap<String, Vec<String>>) -> Result<usize, BotError> {
        self.with_db(move |db| {
            let mut imported = 0;
            for (question, answers) in &map {
                let key = topic_key(question);
                if key.is_empty() {
                    continue;
                }
                for answer in answers.iter().map(|a| a.trim()).filter(|a| !a.is_empty()) {
                    db.insert_knowledge(&key, answer)?;
                    imported += 1;
                }
            }
            Ok(imported)
        })
        .await
    }

    /// Seed an empty knowledge base from a JSON side file. A populated
    /// knowledge base is left alone so restarts do not duplicate answers.
    pub async fn seed_from_file(&self, path: &Path) -> Result<usize, BotError> {
        let is_empty = self.with_db(|db| Ok(db.knowledge_count()? == 0)).await?;
        if !is_empty {
            debug!(path = %path.display(), "knowledge base already populated, skipping seed");
            return Ok(0);
        }

        let raw = tokio::fs::read_to_string(path).await?;
        let map: BTreeMap<String, Vec<String>> = serde_json::from_str(&raw)?;
        let imported = self.import(map).await?;
        info!(path = %path.display(), imported, "seeded knowledge base");
        Ok(imported)
    }

    async fn with_db<T, F>(&self, f: F) -> Result<T, BotError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, BotError> + Send + 'static,
    {
        let path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let db = Database::open_at(&path)?;
            f(&db)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn kb() -> (KnowledgeBase, TempDir) {
        let dir = TempDir::new().unwrap();
        let kb = KnowledgeBase::new(dir.path().join("kb.db"));
        (kb, dir)
    }

    #[test]
    fn test_topic_key() {
        assert_eq!(topic_key("What is X?"), "what is x");
        assert_eq!(topic_key("  Who   wrote... Dune?? extra"), "who wrote dune");
        assert_eq!(topic_key("what is x"), "what is x");
        assert_eq!(topic_key("???"), "");
    }

    #[tokio::test]
    async fn test_learn_then_ask() {
        let (kb, _dir) = kb();
        kb.learn("What is X?", "Y").await.unwrap();

        assert_eq!(kb.lookup("what is x").await.unwrap().as_deref(), Some("Y"));
        assert_eq!(kb.lookup("So, WHAT IS X?").await.unwrap().as_deref(), Some("Y"));
        assert_eq!(kb.lookup("what is y").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_repeated_learn_keeps_first_and_duplicates() {
        let (kb, _dir) = kb();
        kb.learn("What is X?", "Y").await.unwrap();
        kb.learn("what is x", "Z").await.unwrap();
        kb.learn("What is X?", "Y").await.unwrap();

        assert_eq!(kb.lookup("what is x?").await.unwrap().as_deref(), Some("Y"));
        assert_eq!(kb.export().await.unwrap()["what is x"], vec!["Y", "Z", "Y"]);
    }

    #[tokio::test]
    async fn test_learn_rejects_empty() {
        let (kb, _dir) = kb();
        assert!(matches!(kb.learn("?", "Y").await, Err(BotError::Invalid(_))));
        assert!(matches!(kb.learn("What?", "  ").await, Err(BotError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_seed_only_when_empty() {
        let (kb, dir) = kb();
        let seed = dir.path().join("knowledge.json");
        std::fs::write(&seed, r#"{"What is Rust?": ["A systems language"], "Who made you": ["My developers"]}"#)
            .unwrap();

        assert_eq!(kb.seed_from_file(&seed).await.unwrap(), 2);
        assert_eq!(kb.seed_from_file(&seed).await.unwrap(), 0);

        assert_eq!(kb.topics().await.unwrap(), vec!["what is rust", "who made you"]);
        let exported = kb.export().await.unwrap();
        assert_eq!(exported.len(), 2);
        assert_eq!(exported["what is rust"], vec!["A systems language"]);
        assert_eq!(exported["who made you"], vec!["My developers"]);
    }
}
