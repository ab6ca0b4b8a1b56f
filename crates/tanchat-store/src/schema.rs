//! SQLite schema for the chat store
//!
//! The table layout matches the snapshots written by earlier versions of the
//! app, so an old snapshot loads as-is and only missing tables are added.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Tables and the columns each must provide.
const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    ("conversations", &["id", "title", "created_at"]),
    (
        "messages",
        &["id", "conversation_id", "role", "content", "created_at"],
    ),
    ("prompts", &["id", "name", "content", "is_active", "created_at"]),
    ("settings", &["key", "value", "enabled"]),
    ("user_settings", &["key", "value"]),
];

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (unixepoch())
);

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (unixepoch()),
    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS prompts (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    content TEXT NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL DEFAULT (unixepoch())
);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    enabled BOOLEAN NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS user_settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Older snapshots could hold several active prompts. Keep the newest.
const SINGLE_ACTIVE_PROMPT: &str = r#"
UPDATE prompts SET is_active = 0
WHERE is_active = 1
  AND rowid <> (
    SELECT rowid FROM prompts WHERE is_active = 1
    ORDER BY created_at DESC, rowid DESC
    LIMIT 1
  );
"#;

const CREATE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, created_at);
CREATE INDEX IF NOT EXISTS idx_conversations_created ON conversations(created_at);
CREATE UNIQUE INDEX IF NOT EXISTS idx_prompts_single_active ON prompts(is_active) WHERE is_active = 1;
"#;

/// Create any missing tables and indexes, then check the resulting layout.
///
/// Safe to run on every load. Existing rows are never touched.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|e| StoreError::Initialization(format!("enable foreign keys: {}", e)))?;
    conn.execute_batch(CREATE_TABLES)
        .map_err(|e| StoreError::Initialization(format!("create tables: {}", e)))?;
    // Column checks run before indexes so an incompatible table reports the
    // missing column rather than an index error.
    validate(conn)?;
    conn.execute_batch(SINGLE_ACTIVE_PROMPT)
        .map_err(|e| StoreError::Initialization(format!("normalize prompts: {}", e)))?;
    conn.execute_batch(CREATE_INDEXES)
        .map_err(|e| StoreError::Initialization(format!("create indexes: {}", e)))?;
    Ok(())
}

fn validate(conn: &Connection) -> Result<()> {
    for (table, columns) in REQUIRED_COLUMNS {
        let present = table_columns(conn, table)?;
        for column in *columns {
            if !present.iter().any(|c| c == column) {
                return Err(StoreError::Initialization(format!(
                    "incompatible schema: table {} has no column {}",
                    table, column
                )));
            }
        }
    }
    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", table))
        .map_err(|e| StoreError::Initialization(format!("inspect {}: {}", table, e)))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|e| StoreError::Initialization(format!("inspect {}: {}", table, e)))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StoreError::Initialization(format!("inspect {}: {}", table, e)))?;
    Ok(columns)
}

/// Names of the tables the store owns.
pub fn table_names() -> impl Iterator<Item = &'static str> {
    REQUIRED_COLUMNS.iter().map(|(table, _)| *table)
}
