//! Conversation store: per-user conversations and their messages.
//!
//! Every query is scoped by username. A conversation id is claimed by the
//! first user who appends to it and can never be written to or read by
//! anyone else afterwards.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use chatterbox_shared::constants::MAX_TITLE_LEN;
use chatterbox_shared::ConversationId;

use crate::database::{format_ts, parse_ts, Database};
use crate::error::{Result, StoreError};
use crate::models::{ChatMessage, Conversation};

impl Database {
    /// Append one message to a user's conversation, creating the
    /// conversation on first use.
    ///
    /// Fails with [`StoreError::Forbidden`] when the id is owned by another
    /// user.
    pub fn append_message(
        &self,
        username: &str,
        conversation_id: &ConversationId,
        text: &str,
        is_user: bool,
    ) -> Result<ChatMessage> {
        let now = Utc::now();
        let tx = self.conn().unchecked_transaction()?;
        append_within(&tx, username, conversation_id, text, is_user, &format_ts(&now))?;
        tx.commit()?;

        Ok(ChatMessage {
            timestamp: now,
            text: text.to_string(),
            is_user,
        })
    }

    /// Record a user message and the assistant's reply together. Either both
    /// rows are stored or neither is.
    pub fn append_exchange(
        &self,
        username: &str,
        conversation_id: &ConversationId,
        message: &str,
        reply: &str,
    ) -> Result<()> {
        let now_str = format_ts(&Utc::now());
        let tx = self.conn().unchecked_transaction()?;
        append_within(&tx, username, conversation_id, message, true, &now_str)?;
        append_within(&tx, username, conversation_id, reply, false, &now_str)?;
        tx.commit()?;
        Ok(())
    }

    /// Messages of one conversation, oldest first.
    pub fn history(
        &self,
        username: &str,
        conversation_id: &ConversationId,
    ) -> Result<Vec<ChatMessage>> {
        let mut stmt = self.conn().prepare(
            "SELECT timestamp, message, is_user
             FROM chats
             WHERE username = ?1 AND conversation_id = ?2
             ORDER BY timestamp ASC, id ASC",
        )?;

        let rows = stmt.query_map(params![username, conversation_id.as_str()], |row| {
            let ts: String = row.get(0)?;
            Ok(ChatMessage {
                timestamp: parse_ts(0, &ts)?,
                text: row.get(1)?,
                is_user: row.get(2)?,
            })
        })?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// A user's conversations, most recently active first.
    pub fn list_conversations(&self, username: &str) -> Result<Vec<Conversation>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, username, title, created_at, updated_at
             FROM conversations
             WHERE username = ?1
             ORDER BY updated_at DESC, rowid DESC",
        )?;

        let rows = stmt.query_map(params![username], row_to_conversation)?;

        let mut conversations = Vec::new();
        for row in rows {
            conversations.push(row?);
        }
        Ok(conversations)
    }

    /// Delete a conversation and all of its messages. Returns `true` if the
    /// user owned a conversation with that id.
    pub fn delete_conversation(
        &self,
        username: &str,
        conversation_id: &ConversationId,
    ) -> Result<bool> {
        let tx = self.conn().unchecked_transaction()?;
        tx.execute(
            "DELETE FROM chats WHERE username = ?1 AND conversation_id = ?2",
            params![username, conversation_id.as_str()],
        )?;
        let affected = tx.execute(
            "DELETE FROM conversations WHERE username = ?1 AND id = ?2",
            params![username, conversation_id.as_str()],
        )?;
        tx.commit()?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn append_within(
    conn: &Connection,
    username: &str,
    conversation_id: &ConversationId,
    text: &str,
    is_user: bool,
    now_str: &str,
) -> Result<()> {
    let owner: Option<(String, Option<String>)> = conn
        .query_row(
            "SELECT username, title FROM conversations WHERE id = ?1",
            params![conversation_id.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let title = is_user.then(|| make_title(text));

    match owner {
        Some((owner, _)) if owner != username => {
            tracing::warn!(
                conversation = %conversation_id,
                user = username,
                "rejected append to a conversation owned by another user"
            );
            return Err(StoreError::Forbidden);
        }
        Some((_, existing_title)) => {
            let title = existing_title.or(title);
            conn.execute(
                "UPDATE conversations SET updated_at = ?1, title = ?2 WHERE id = ?3",
                params![now_str, title, conversation_id.as_str()],
            )?;
        }
        None => {
            conn.execute(
                "INSERT INTO conversations (id, username, title, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![conversation_id.as_str(), username, title, now_str],
            )?;
        }
    }

    conn.execute(
        "INSERT INTO chats (username, conversation_id, message, is_user, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![username, conversation_id.as_str(), text, is_user, now_str],
    )?;
    Ok(())
}

fn make_title(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= MAX_TITLE_LEN {
        return text.to_string();
    }
    let mut title: String = text.chars().take(MAX_TITLE_LEN - 3).collect();
    title.push_str("...");
    title
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let created_str: String = row.get(3)?;
    let updated_str: String = row.get(4)?;

    Ok(Conversation {
        id: row.get(0)?,
        username: row.get(1)?,
        title: row.get(2)?,
        created_at: parse_ts(3, &created_str)?,
        updated_at: parse_ts(4, &updated_str)?,
    })
}
