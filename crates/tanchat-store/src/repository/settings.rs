use rusqlite::{params, OptionalExtension};

use super::ChatRepository;
use crate::error::{Result, StoreError};
use crate::model::Setting;

fn require_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(StoreError::Validation("setting key must not be empty".into()));
    }
    Ok(())
}

impl ChatRepository {
    /// Upsert a setting; the latest write wins.
    pub fn set_setting(&self, key: &str, value: &str, enabled: bool) -> Result<()> {
        require_key(key)?;
        self.engine.mutate(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO settings (key, value, enabled) VALUES (?1, ?2, ?3)",
                params![key, value, enabled],
            )
            .map_err(|e| StoreError::sql("set setting", e))?;
            Ok(())
        })
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<Setting>> {
        require_key(key)?;
        self.engine.read(|conn| {
            conn.query_row(
                "SELECT value, enabled FROM settings WHERE key = ?1",
                params![key],
                |row| {
                    Ok(Setting {
                        value: row.get(0)?,
                        enabled: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(|e| StoreError::sql("get setting", e))
        })
    }

    /// Upsert a per-user value such as the avatar image data.
    pub fn set_user_setting(&self, key: &str, value: &str) -> Result<()> {
        require_key(key)?;
        self.engine.mutate(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO user_settings (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| StoreError::sql("set user setting", e))?;
            Ok(())
        })
    }

    pub fn get_user_setting(&self, key: &str) -> Result<Option<String>> {
        require_key(key)?;
        self.engine.read(|conn| {
            conn.query_row(
                "SELECT value FROM user_settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::sql("get user setting", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::error::StoreError;
    use crate::model::Setting;
    use crate::repository::test_support::repository;

    #[test]
    fn setting_upsert_latest_wins() {
        let (_slot, repo) = repository();
        assert!(repo.get_setting("systemPrompt").unwrap().is_none());

        repo.set_setting("systemPrompt", "be brief", true).unwrap();
        repo.set_setting("systemPrompt", "be thorough", false).unwrap();

        assert_eq!(
            repo.get_setting("systemPrompt").unwrap(),
            Some(Setting {
                value: "be thorough".into(),
                enabled: false,
            })
        );
    }

    #[test]
    fn user_setting_upsert_and_missing() {
        let (_slot, repo) = repository();
        assert_eq!(repo.get_user_setting("avatar").unwrap(), None);
        repo.set_user_setting("avatar", "data:image/png;base64,AAAA").unwrap();
        repo.set_user_setting("avatar", "data:image/png;base64,BBBB").unwrap();
        assert_eq!(
            repo.get_user_setting("avatar").unwrap().as_deref(),
            Some("data:image/png;base64,BBBB")
        );
    }

    #[test]
    fn empty_keys_are_rejected() {
        let (_slot, repo) = repository();
        assert!(matches!(
            repo.set_setting("", "x", false),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            repo.get_user_setting("  "),
            Err(StoreError::Validation(_))
        ));
    }
}
