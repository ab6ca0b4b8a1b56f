use rusqlite::params;

use super::{now, ChatRepository};
use crate::error::{Result, StoreError};
use crate::model::Conversation;

impl ChatRepository {
    /// Insert a conversation. Fails if `id` is already taken.
    pub fn create_conversation(&self, id: &str, title: &str) -> Result<()> {
        self.engine.mutate(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, title, created_at) VALUES (?1, ?2, ?3)",
                params![id, title, now()],
            )
            .map_err(|e| StoreError::sql("create conversation", e))?;
            Ok(())
        })
    }

    /// Retitle a conversation. An unknown id is silently ignored.
    pub fn update_conversation_title(&self, id: &str, title: &str) -> Result<()> {
        self.engine.mutate(|conn| {
            conn.execute(
                "UPDATE conversations SET title = ?1 WHERE id = ?2",
                params![title, id],
            )
            .map_err(|e| StoreError::sql("update conversation title", e))?;
            Ok(())
        })
    }

    /// All conversations, newest first.
    pub fn get_conversations(&self) -> Result<Vec<Conversation>> {
        self.engine.read(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, title, created_at FROM conversations
                     ORDER BY created_at DESC, rowid DESC",
                )
                .map_err(|e| StoreError::sql("prepare conversations", e))?;
            let conversations = stmt
                .query_map([], |row| {
                    Ok(Conversation {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                })
                .map_err(|e| StoreError::sql("query conversations", e))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| StoreError::sql("collect conversations", e))?;
            Ok(conversations)
        })
    }

    /// Delete a conversation; its messages go with it.
    pub fn delete_conversation(&self, id: &str) -> Result<()> {
        self.engine.mutate(|conn| {
            conn.execute("DELETE FROM conversations WHERE id = ?1", params![id])
                .map_err(|e| StoreError::sql("delete conversation", e))?;
            Ok(())
        })
    }
}
