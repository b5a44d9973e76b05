//! v001 -- Initial schema creation.
//!
//! Creates the three core tables: `users`, `conversations` and `chats`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    username              TEXT PRIMARY KEY NOT NULL,
    password_hash         TEXT NOT NULL,              -- Argon2id PHC string
    display_name          TEXT,
    email                 TEXT,
    notifications_enabled INTEGER NOT NULL DEFAULT 1, -- boolean 0/1
    profile_picture       TEXT,
    created_at            TEXT NOT NULL               -- RFC-3339
);

-- ----------------------------------------------------------------
-- Conversations (one owner each)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS conversations (
    id         TEXT PRIMARY KEY NOT NULL,
    username   TEXT NOT NULL,                 -- FK -> users(username)
    title      TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    FOREIGN KEY (username) REFERENCES users(username) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_conversations_user_updated
    ON conversations(username, updated_at DESC);

-- ----------------------------------------------------------------
-- Chat messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chats (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    username        TEXT NOT NULL,
    conversation_id TEXT NOT NULL,        -- FK -> conversations(id)
    message         TEXT NOT NULL,
    is_user         INTEGER NOT NULL,     -- boolean 0/1
    timestamp       TEXT NOT NULL,

    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_chats_user_conversation_ts
    ON chats(username, conversation_id, timestamp);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
