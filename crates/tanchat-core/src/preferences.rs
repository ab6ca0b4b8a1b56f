//! UI preferences kept next to the database snapshot.
//!
//! Stored as camelCase JSON under their own slot key, separate from the
//! database so they survive a database reset.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tanchat_store::{DurableSlot, SlotError};

/// Slot key used by the browser build of the app.
pub const DEFAULT_PREFERENCES_KEY: &str = "tanchat-settings";

pub const DEFAULT_MODEL: &str = "grok-4";

pub const DEFAULT_THEME: &str = "dark";

/// Themes the UI ships. Unknown ids fall back to the first.
pub const THEMES: &[&str] = &["dark", "light", "ocean", "forest", "sunset", "lavender", "sentry"];

#[derive(Debug, thiserror::Error)]
pub enum PreferencesError {
    #[error("Slot error: {0}")]
    Slot(#[from] SlotError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningSummary {
    Auto,
    Detailed,
    None,
}

impl FromStr for ReasoningEffort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(ReasoningEffort::Low),
            "medium" => Ok(ReasoningEffort::Medium),
            "high" => Ok(ReasoningEffort::High),
            other => Err(format!("reasoning effort must be low, medium or high, got {:?}", other)),
        }
    }
}

impl FromStr for ReasoningSummary {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(ReasoningSummary::Auto),
            "detailed" => Ok(ReasoningSummary::Detailed),
            "none" => Ok(ReasoningSummary::None),
            other => Err(format!("reasoning summary must be auto, detailed or none, got {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningConfig {
    pub reasoning_effort: ReasoningEffort,
    pub reasoning_summary: ReasoningSummary,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            reasoning_effort: ReasoningEffort::Medium,
            reasoning_summary: ReasoningSummary::None,
        }
    }
}

/// Persisted choices. Absent fields mean "use the default".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_config: Option<ReasoningConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_theme: Option<String>,
}

impl Preferences {
    /// Keep only the fields that have the expected shape.
    ///
    /// Anything else in the document is ignored rather than failing the load.
    fn from_json(value: &Value) -> Self {
        let text = |name: &str| value.get(name).and_then(Value::as_str).map(str::to_string);
        let reasoning_config = value
            .get("reasoningConfig")
            .filter(|v| v.is_object())
            .and_then(|v| serde_json::from_value::<ReasoningConfig>(v.clone()).ok());
        Self {
            selected_model: text("selectedModel"),
            reasoning_config,
            selected_theme: text("selectedTheme"),
        }
    }

    pub fn model(&self) -> &str {
        self.selected_model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn reasoning(&self) -> ReasoningConfig {
        self.reasoning_config.unwrap_or_default()
    }

    pub fn theme(&self) -> &str {
        match self.selected_theme.as_deref() {
            Some(theme) if THEMES.iter().any(|t| *t == theme) => theme,
            _ => DEFAULT_THEME,
        }
    }
}

/// Reads and writes [`Preferences`] in a durable slot.
#[derive(Clone)]
pub struct PreferenceStore {
    slot: Arc<dyn DurableSlot>,
    key: String,
}

impl PreferenceStore {
    pub fn new(slot: Arc<dyn DurableSlot>, key: impl Into<String>) -> Self {
        Self {
            slot,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load preferences. Unreadable or malformed storage yields defaults.
    pub fn load(&self) -> Preferences {
        let stored = match self.slot.read(&self.key) {
            Ok(Some(stored)) => stored,
            Ok(None) => return Preferences::default(),
            Err(e) => {
                tracing::warn!("Failed to read preferences {:?}: {}", self.key, e);
                return Preferences::default();
            }
        };
        match serde_json::from_str::<Value>(&stored) {
            Ok(value) => Preferences::from_json(&value),
            Err(e) => {
                tracing::warn!("Ignoring malformed preferences {:?}: {}", self.key, e);
                Preferences::default()
            }
        }
    }

    pub fn save(&self, preferences: &Preferences) -> Result<(), PreferencesError> {
        let json = serde_json::to_string(preferences)?;
        self.slot.write(&self.key, &json)?;
        Ok(())
    }

    pub fn save_selected_model(&self, model: &str) -> Result<Preferences, PreferencesError> {
        self.update(|p| p.selected_model = Some(model.to_string()))
    }

    pub fn save_reasoning_config(
        &self,
        config: ReasoningConfig,
    ) -> Result<Preferences, PreferencesError> {
        self.update(|p| p.reasoning_config = Some(config))
    }

    pub fn save_selected_theme(&self, theme: &str) -> Result<Preferences, PreferencesError> {
        self.update(|p| p.selected_theme = Some(theme.to_string()))
    }

    pub fn clear(&self) -> Result<(), PreferencesError> {
        self.slot.remove(&self.key)?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut Preferences)) -> Result<Preferences, PreferencesError> {
        let mut preferences = self.load();
        f(&mut preferences);
        self.save(&preferences)?;
        Ok(preferences)
    }
}

impl std::fmt::Debug for PreferenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceStore").field("key", &self.key).finish()
    }
}
