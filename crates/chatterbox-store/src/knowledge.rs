//! Knowledge-base rows.
//!
//! Topics are stored already normalized (see the bot crate); this module only
//! appends and reads rows. Learning is one `INSERT`, so concurrent writers
//! never lose each other's answers.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::database::{format_ts, Database};
use crate::error::Result;
use crate::models::KnowledgeEntry;

impl Database {
    /// Append an answer to a topic. Repeating an answer stores it again.
    pub fn insert_knowledge(&self, topic: &str, answer: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO knowledge (topic, answer, created_at) VALUES (?1, ?2, ?3)",
            params![topic, answer, format_ts(&Utc::now())],
        )?;
        Ok(())
    }

    /// First answer of the earliest-learned topic contained in `text`.
    /// `text` must be normalized the same way topics are.
    pub fn first_matching_answer(&self, text: &str) -> Result<Option<String>> {
        let answer = self
            .conn()
            .query_row(
                "SELECT answer FROM knowledge
                 WHERE topic <> '' AND instr(?1, topic) > 0
                 ORDER BY id ASC
                 LIMIT 1",
                params![text.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(answer)
    }

    /// Every topic with its answers, topics in the order they were first
    /// learned.
    pub fn knowledge_entries(&self) -> Result<Vec<KnowledgeEntry>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT topic, answer FROM knowledge ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut entries: Vec<KnowledgeEntry> = Vec::new();
        for row in rows {
            let (topic, answer) = row?;
            match entries.iter_mut().find(|e| e.topic == topic) {
                Some(entry) => entry.answers.push(answer),
                None => entries.push(KnowledgeEntry {
                    topic,
                    answers: vec![answer],
                }),
            }
        }
        Ok(entries)
    }

    /// Number of stored answers across all topics.
    pub fn knowledge_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM knowledge", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_kept() {
        let db = Database::open_in_memory().unwrap();
        db.insert_knowledge("what is rust", "A language").unwrap();
        db.insert_knowledge("what is rust", "A language").unwrap();

        let entries = db.knowledge_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].answers, vec!["A language", "A language"]);
        assert_eq!(db.knowledge_count().unwrap(), 2);
    }

    #[test]
    fn topic_anywhere_in_text_matches() {
        let db = Database::open_in_memory().unwrap();
        db.insert_knowledge("python", "A language").unwrap();

        assert_eq!(
            db.first_matching_answer("do you know pythonic code").unwrap().as_deref(),
            Some("A language")
        );
        assert_eq!(
            db.first_matching_answer("python").unwrap().as_deref(),
            Some("A language")
        );
        assert_eq!(db.first_matching_answer("pyth on").unwrap(), None);
    }

    #[test]
    fn earliest_topic_wins() {
        let db = Database::open_in_memory().unwrap();
        db.insert_knowledge("rust", "first topic").unwrap();
        db.insert_knowledge("what is rust", "second topic").unwrap();
        db.insert_knowledge("rust", "later answer").unwrap();

        assert_eq!(
            db.first_matching_answer("what is rust").unwrap().as_deref(),
            Some("first topic")
        );
    }

    #[test]
    fn entries_group_by_topic() {
        let db = Database::open_in_memory().unwrap();
        db.insert_knowledge("a", "1").unwrap();
        db.insert_knowledge("b", "2").unwrap();
        db.insert_knowledge("a", "3").unwrap();

        let entries = db.knowledge_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].topic, "a");
        assert_eq!(entries[0].answers, vec!["1", "3"]);
        assert_eq!(entries[1].answers, vec!["2"]);
    }
}
