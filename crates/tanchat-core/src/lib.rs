//! tanchat-core: chat application logic over the tanchat store
//!
//! - [`projection`]: the in-memory conversation tree the UI renders
//! - [`session`]: user actions (new chat, send, prompts, preferences)
//! - [`completion`]: shaping requests for the external model service
//! - [`preferences`]: model, reasoning and theme choices in their own slot
//! - [`config`]: TOML configuration

pub mod completion;
pub mod config;
pub mod ids;
pub mod preferences;
pub mod projection;
pub mod session;

pub use completion::{
    ChatTurn, CompletionError, CompletionReply, CompletionRequest, CompletionService, Provider,
    DEFAULT_SYSTEM_PROMPT,
};
pub use config::{ChatConfig, ConfigError, StorageConfig, TanchatConfig};
pub use ids::IdGenerator;
pub use preferences::{
    PreferenceStore, Preferences, PreferencesError, ReasoningConfig, ReasoningEffort,
    ReasoningSummary,
};
pub use projection::{ChatState, ConversationView};
pub use session::{ChatSession, SendOutcome, SessionError, SessionResult};
