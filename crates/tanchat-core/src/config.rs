//! Configuration for tanchat
//!
//! Loaded from `<config dir>/tanchat/config.toml`:
//!
//! ```toml
//! [store]
//! snapshot_key = "chatdb"
//!
//! [storage]
//! data_dir = "/home/me/.local/share/tanchat"
//! preferences_key = "tanchat-settings"
//!
//! [chat]
//! new_chat_title = "New Chat"
//! title_max_chars = 30
//! error_reply = "Sorry, I encountered an error processing your request."
//! ```
//!
//! Every section and field is optional.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tanchat_store::StoreConfig;

use crate::completion::DEFAULT_SYSTEM_PROMPT;
use crate::preferences::DEFAULT_PREFERENCES_KEY;

/// Errors that can occur when loading the configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("TOML parse error: {0}")]
    Parse(String),
}

/// Application-wide configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TanchatConfig {
    /// Database engine settings
    pub store: StoreConfig,
    /// Where slots live on disk
    pub storage: StorageConfig,
    /// Chat behaviour
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Slot directory; the platform data dir when unset
    pub data_dir: Option<PathBuf>,
    /// Slot key for UI preferences
    pub preferences_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            preferences_key: DEFAULT_PREFERENCES_KEY.to_string(),
        }
    }
}

impl StorageConfig {
    /// The configured data dir, else `<data dir>/tanchat`, else `./.tanchat`.
    pub fn resolved_data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|d| d.join("tanchat"))
            .unwrap_or_else(|| PathBuf::from(".tanchat"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Title given to conversations created empty
    pub new_chat_title: String,
    /// Titles derived from the first message are cut to this many characters
    pub title_max_chars: usize,
    /// Stored as the assistant reply when a completion fails
    pub error_reply: String,
    /// Base system prompt sent with every request
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            new_chat_title: "New Chat".to_string(),
            title_max_chars: 30,
            error_reply: "Sorry, I encountered an error processing your request.".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl TanchatConfig {
    /// Standard config file location, if the platform has a config dir.
    pub fn standard_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("tanchat").join("config.toml"))
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from the standard location.
    pub fn load_standard() -> Result<Self, ConfigError> {
        match Self::standard_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }
}
