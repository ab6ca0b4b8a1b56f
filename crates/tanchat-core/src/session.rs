//! Chat actions: the operations the UI triggers.
//!
//! Each action writes through the repository and then refreshes the
//! [`ChatState`] projection, so the state always matches the last read.

use tanchat_store::{ChatRepository, NewMessage, Role, StoreError};

use crate::completion::{CompletionError, CompletionRequest, CompletionService};
use crate::config::ChatConfig;
use crate::ids::IdGenerator;
use crate::preferences::{PreferenceStore, Preferences, PreferencesError, ReasoningConfig};
use crate::projection::ChatState;

/// Errors from session actions
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Preferences(#[from] PreferencesError),

    #[error("Unknown conversation: {0}")]
    UnknownConversation(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Result of a completed `send_message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub conversation_id: String,
    /// The assistant message as stored
    pub reply: String,
    /// The service failed and `reply` is the apology text
    pub failed: bool,
}

pub struct ChatSession {
    repo: ChatRepository,
    preferences: PreferenceStore,
    config: ChatConfig,
    state: ChatState,
    ids: IdGenerator,
}

impl ChatSession {
    /// Open a session over an initialized repository.
    pub fn new(
        repo: ChatRepository,
        preferences: PreferenceStore,
        config: ChatConfig,
    ) -> SessionResult<Self> {
        let state = ChatState::load(&repo)?;
        Ok(Self {
            repo,
            preferences,
            config,
            state,
            ids: IdGenerator::new(),
        })
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn repository(&self) -> &ChatRepository {
        &self.repo
    }

    pub fn preferences(&self) -> Preferences {
        self.preferences.load()
    }

    // MARK: - Conversations

    /// Start an empty conversation and make it current.
    pub fn create_new_chat(&mut self) -> SessionResult<String> {
        let id = self.ids.next_id();
        self.repo.create_conversation(&id, &self.config.new_chat_title)?;
        self.state.current_conversation_id = Some(id.clone());
        self.refresh()?;
        Ok(id)
    }

    pub fn select_conversation(&mut self, id: &str) -> SessionResult<()> {
        if self.state.conversation(id).is_none() {
            return Err(SessionError::UnknownConversation(id.to_string()));
        }
        self.state.current_conversation_id = Some(id.to_string());
        Ok(())
    }

    pub fn rename_conversation(&mut self, id: &str, title: &str) -> SessionResult<()> {
        self.repo.update_conversation_title(id, title)?;
        self.refresh()
    }

    /// Delete a conversation; clears the selection when it was current.
    pub fn delete_conversation(&mut self, id: &str) -> SessionResult<()> {
        self.repo.delete_conversation(id)?;
        if self.state.current_conversation_id.as_deref() == Some(id) {
            self.state.current_conversation_id = None;
        }
        self.refresh()
    }

    pub fn clear_all_chats(&mut self) -> SessionResult<()> {
        let ids: Vec<String> = self.state.conversations.iter().map(|c| c.id.clone()).collect();
        for id in &ids {
            self.repo.delete_conversation(id)?;
        }
        self.state.current_conversation_id = None;
        tracing::info!("Cleared {} conversations", ids.len());
        self.refresh()
    }

    // MARK: - Prompts

    pub fn create_prompt(&mut self, name: &str, content: &str) -> SessionResult<String> {
        require_text("prompt name", name)?;
        require_text("prompt content", content)?;
        let id = self.ids.next_id();
        self.repo.create_prompt(&id, name.trim(), content.trim())?;
        self.refresh()?;
        Ok(id)
    }

    pub fn update_prompt(&mut self, id: &str, name: &str, content: &str) -> SessionResult<()> {
        require_text("prompt name", name)?;
        require_text("prompt content", content)?;
        self.repo.update_prompt(id, name.trim(), content.trim())?;
        self.refresh()
    }

    pub fn delete_prompt(&mut self, id: &str) -> SessionResult<()> {
        self.repo.delete_prompt(id)?;
        self.refresh()
    }

    pub fn set_prompt_active(&mut self, id: &str, activate: bool) -> SessionResult<()> {
        self.repo.set_prompt_active(id, activate)?;
        self.refresh()
    }

    // MARK: - Preferences

    pub fn set_model(&self, model: &str) -> SessionResult<Preferences> {
        require_text("model", model)?;
        Ok(self.preferences.save_selected_model(model.trim())?)
    }

    pub fn set_reasoning(&self, config: ReasoningConfig) -> SessionResult<Preferences> {
        Ok(self.preferences.save_reasoning_config(config)?)
    }

    pub fn set_theme(&self, theme: &str) -> SessionResult<Preferences> {
        require_text("theme", theme)?;
        Ok(self.preferences.save_selected_theme(theme.trim())?)
    }

    // MARK: - Messages

    /// The request that would be sent for `conversation_id` right now.
    pub fn build_request(&self, conversation_id: &str) -> SessionResult<CompletionRequest> {
        let transcript = self.repo.get_messages_for_conversation(conversation_id)?;
        let active = self.repo.get_active_prompt()?;
        let preferences = self.preferences.load();
        Ok(CompletionRequest::build(
            &transcript,
            &self.config.system_prompt,
            active.as_ref(),
            preferences.model(),
            preferences.reasoning(),
        )?)
    }

    /// Store the user's message, ask the model, and store its reply.
    ///
    /// Returns `None` when the input is blank or a send is already running.
    /// Completion failures do not surface as errors: the apology reply is
    /// stored instead and the outcome is flagged `failed`. Store failures
    /// are returned as errors.
    pub fn send_message(
        &mut self,
        input: &str,
        service: &dyn CompletionService,
    ) -> SessionResult<Option<SendOutcome>> {
        let input = input.trim();
        if input.is_empty() || self.state.is_loading {
            return Ok(None);
        }

        self.state.is_loading = true;
        let outcome = self.exchange(input, service);
        self.state.is_loading = false;
        let refreshed = self.refresh();

        let outcome = outcome?;
        refreshed?;
        Ok(Some(outcome))
    }

    fn exchange(
        &mut self,
        input: &str,
        service: &dyn CompletionService,
    ) -> SessionResult<SendOutcome> {
        let title: String = input.chars().take(self.config.title_max_chars).collect();
        let conversation_id = match self.state.current_conversation() {
            Some(current) => {
                let id = current.id.clone();
                if current.messages.is_empty() {
                    self.repo.update_conversation_title(&id, &title)?;
                }
                id
            }
            None => {
                let id = self.ids.next_id();
                self.repo.create_conversation(&id, &title)?;
                self.state.current_conversation_id = Some(id.clone());
                id
            }
        };

        let user_id = self.ids.next_id();
        self.repo
            .add_message(&NewMessage::new(user_id, &conversation_id, Role::User, input))?;

        let (reply, failed) = match self.ask(&conversation_id, service) {
            Ok(text) => (text, false),
            Err(SessionError::Store(e)) => return Err(SessionError::Store(e)),
            Err(e) => {
                tracing::error!("Completion failed for {}: {}", conversation_id, e);
                (self.config.error_reply.clone(), true)
            }
        };

        let assistant_id = self.ids.next_id();
        self.repo.add_message(&NewMessage::new(
            assistant_id,
            &conversation_id,
            Role::Assistant,
            reply.as_str(),
        ))?;

        Ok(SendOutcome {
            conversation_id,
            reply,
            failed,
        })
    }

    fn ask(&self, conversation_id: &str, service: &dyn CompletionService) -> SessionResult<String> {
        let request = self.build_request(conversation_id)?;
        tracing::debug!(
            "Requesting completion: model={} provider={} messages={}",
            request.model,
            request.provider.as_str(),
            request.messages.len()
        );
        Ok(service.complete(&request)?.into_text()?)
    }

    /// Drop the database and start empty. Preferences are kept.
    pub fn reset_database(&mut self) -> SessionResult<()> {
        let engine = self.repo.engine();
        engine.reset()?;
        engine.initialize()?;
        self.state = ChatState::load(&self.repo)?;
        Ok(())
    }

    fn refresh(&mut self) -> SessionResult<()> {
        self.state.refresh(&self.repo)?;
        Ok(())
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("current", &self.state.current_conversation_id)
            .field("conversations", &self.state.conversations.len())
            .field("is_loading", &self.state.is_loading)
            .finish()
    }
}

fn require_text(what: &str, value: &str) -> SessionResult<()> {
    if value.trim().is_empty() {
        return Err(SessionError::Validation(format!("{} must not be empty", what)));
    }
    Ok(())
}
