use rusqlite::{params, Connection, OptionalExtension};

use super::{now, ChatRepository};
use crate::error::{Result, StoreError};
use crate::model::Prompt;

const PROMPT_COLUMNS: &str = "id, name, content, is_active, created_at";

impl ChatRepository {
    /// Insert a prompt as the single active prompt.
    pub fn create_prompt(&self, id: &str, name: &str, content: &str) -> Result<()> {
        self.engine.mutate(|conn| {
            deactivate_all(conn)?;
            conn.execute(
                "INSERT INTO prompts (id, name, content, is_active, created_at)
                 VALUES (?1, ?2, ?3, 1, ?4)",
                params![id, name, content, now()],
            )
            .map_err(|e| StoreError::sql("create prompt", e))?;
            Ok(())
        })
    }

    /// Change a prompt's name and content. An unknown id is silently ignored.
    pub fn update_prompt(&self, id: &str, name: &str, content: &str) -> Result<()> {
        self.engine.mutate(|conn| {
            conn.execute(
                "UPDATE prompts SET name = ?1, content = ?2 WHERE id = ?3",
                params![name, content, id],
            )
            .map_err(|e| StoreError::sql("update prompt", e))?;
            Ok(())
        })
    }

    /// Deactivate every prompt, then activate `id` when `activate` is set.
    ///
    /// Both steps share one transaction, so no reader ever observes the gap.
    pub fn set_prompt_active(&self, id: &str, activate: bool) -> Result<()> {
        self.engine.mutate(|conn| {
            deactivate_all(conn)?;
            if activate {
                conn.execute(
                    "UPDATE prompts SET is_active = 1 WHERE id = ?1",
                    params![id],
                )
                .map_err(|e| StoreError::sql("activate prompt", e))?;
            }
            Ok(())
        })
    }

    /// Delete a prompt. Deleting the active prompt leaves none active.
    pub fn delete_prompt(&self, id: &str) -> Result<()> {
        self.engine.mutate(|conn| {
            conn.execute("DELETE FROM prompts WHERE id = ?1", params![id])
                .map_err(|e| StoreError::sql("delete prompt", e))?;
            Ok(())
        })
    }

    /// All prompts, newest first.
    pub fn get_prompts(&self) -> Result<Vec<Prompt>> {
        self.engine.read(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM prompts ORDER BY created_at DESC, rowid DESC",
                    PROMPT_COLUMNS
                ))
                .map_err(|e| StoreError::sql("prepare prompts", e))?;
            let prompts = stmt
                .query_map([], row_to_prompt)
                .map_err(|e| StoreError::sql("query prompts", e))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| StoreError::sql("collect prompts", e))?;
            Ok(prompts)
        })
    }

    pub fn get_active_prompt(&self) -> Result<Option<Prompt>> {
        self.engine.read(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM prompts WHERE is_active = 1 LIMIT 1",
                    PROMPT_COLUMNS
                ),
                [],
                row_to_prompt,
            )
            .optional()
            .map_err(|e| StoreError::sql("query active prompt", e))
        })
    }
}

fn deactivate_all(conn: &Connection) -> Result<()> {
    conn.execute("UPDATE prompts SET is_active = 0 WHERE is_active <> 0", [])
        .map_err(|e| StoreError::sql("deactivate prompts", e))?;
    Ok(())
}

fn row_to_prompt(row: &rusqlite::Row<'_>) -> rusqlite::Result<Prompt> {
    Ok(Prompt {
        id: row.get(0)?,
        name: row.get(1)?,
        content: row.get(2)?,
        is_active: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::repository::test_support::repository;
    use crate::repository::ChatRepository;

    fn active_ids(repo: &ChatRepository) -> Vec<String> {
        repo.get_prompts()
            .unwrap()
            .into_iter()
            .filter(|p| p.is_active)
            .map(|p| p.id)
            .collect()
    }

    #[test]
    fn newest_prompt_becomes_the_only_active_one() {
        let (_slot, repo) = repository();
        repo.create_prompt("p1", "A", "sys A").unwrap();
        repo.create_prompt("p2", "B", "sys B").unwrap();

        let prompts = repo.get_prompts().unwrap();
        let p1 = prompts.iter().find(|p| p.id == "p1").unwrap();
        let p2 = prompts.iter().find(|p| p.id == "p2").unwrap();
        assert!(p2.is_active);
        assert!(!p1.is_active);
        assert_eq!(repo.get_active_prompt().unwrap().unwrap().id, "p2");
    }

    #[test]
    fn set_active_switches_and_deactivates() {
        let (_slot, repo) = repository();
        repo.create_prompt("p1", "A", "sys A").unwrap();
        repo.create_prompt("p2", "B", "sys B").unwrap();

        repo.set_prompt_active("p1", true).unwrap();
        assert_eq!(active_ids(&repo), vec!["p1"]);

        repo.set_prompt_active("p1", false).unwrap();
        assert!(active_ids(&repo).is_empty());
        assert!(repo.get_active_prompt().unwrap().is_none());
    }

    #[test]
    fn activating_unknown_id_leaves_none_active() {
        let (_slot, repo) = repository();
        repo.create_prompt("p1", "A", "sys A").unwrap();
        repo.set_prompt_active("missing", true).unwrap();
        assert!(active_ids(&repo).is_empty());
    }

    #[test]
    fn deleting_active_prompt_does_not_promote_another() {
        let (_slot, repo) = repository();
        repo.create_prompt("p1", "A", "sys A").unwrap();
        repo.create_prompt("p2", "B", "sys B").unwrap();

        repo.delete_prompt("p2").unwrap();

        let prompts = repo.get_prompts().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(!prompts[0].is_active);
    }

    #[test]
    fn update_prompt_keeps_activity() {
        let (_slot, repo) = repository();
        repo.create_prompt("p1", "A", "sys A").unwrap();
        repo.update_prompt("p1", "A2", "sys A2").unwrap();
        repo.update_prompt("missing", "x", "y").unwrap();

        let prompt = repo.get_active_prompt().unwrap().unwrap();
        assert_eq!(prompt.name, "A2");
        assert_eq!(prompt.content, "sys A2");
    }
}
