use rusqlite::params;

use super::{now, ChatRepository};
use crate::error::{Result, StoreError};
use crate::model::{Message, NewMessage, Role};

impl ChatRepository {
    /// Append a message to its conversation.
    ///
    /// An unknown `conversation_id` is rejected by the foreign key and surfaces
    /// as `StoreError::ConstraintViolation`.
    pub fn add_message(&self, message: &NewMessage) -> Result<()> {
        self.engine.mutate(|conn| {
            conn.execute(
                "INSERT INTO messages (id, conversation_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    message.id,
                    message.conversation_id,
                    message.role.as_str(),
                    message.content,
                    now(),
                ],
            )
            .map_err(|e| StoreError::sql("add message", e))?;
            Ok(())
        })
    }

    /// Transcript of a conversation, oldest first. Messages sharing a
    /// timestamp keep their insertion order.
    pub fn get_messages_for_conversation(&self, conversation_id: &str) -> Result<Vec<Message>> {
        self.engine.read(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, conversation_id, role, content, created_at FROM messages
                     WHERE conversation_id = ?1
                     ORDER BY created_at ASC, rowid ASC",
                )
                .map_err(|e| StoreError::sql("prepare messages", e))?;
            let messages = stmt
                .query_map(params![conversation_id], row_to_message)
                .map_err(|e| StoreError::sql("query messages", e))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| StoreError::sql("collect messages", e))?;
            Ok(messages)
        })
    }

    pub fn count_messages(&self, conversation_id: &str) -> Result<usize> {
        self.engine.read(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
                    params![conversation_id],
                    |row| row.get(0),
                )
                .map_err(|e| StoreError::sql("count messages", e))?;
            Ok(count as usize)
        })
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let role: String = row.get(2)?;
    let role = role.parse::<Role>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}
