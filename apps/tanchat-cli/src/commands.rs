//! Subcommand implementations over one composed store.
//!
//! The engine is opened up front, but a failed load does not stop the CLI:
//! `status` reports the failure and `reset` recovers from it. Everything
//! else builds the chat session on first use and surfaces the load error
//! there.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tanchat_core::{
    ChatConfig, ChatSession, PreferenceStore, ReasoningConfig, ReasoningEffort, ReasoningSummary,
    TanchatConfig,
};
use tanchat_store::{ChatRepository, DurableSlot, Engine, EngineStatus, FileSlot};

use crate::offline::OfflineService;

type CommandResult = Result<(), Box<dyn Error>>;

pub struct App {
    engine: Arc<Engine>,
    preferences: PreferenceStore,
    chat: ChatConfig,
    data_dir: PathBuf,
    session: Option<ChatSession>,
}

impl App {
    /// Compose slot, engine and preferences from configuration.
    pub fn open(config_path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<Self, Box<dyn Error>> {
        let mut config = match config_path {
            Some(path) => TanchatConfig::load(path)?,
            None => TanchatConfig::load_standard()?,
        };
        if let Some(dir) = data_dir {
            config.storage.data_dir = Some(dir);
        }
        let data_dir = config.storage.resolved_data_dir();

        let slot: Arc<dyn DurableSlot> = Arc::new(FileSlot::open(&data_dir)?);
        let engine = Arc::new(Engine::new(slot.clone(), config.store.clone()));
        if let Err(e) = engine.initialize() {
            tracing::warn!("Database unavailable in {}: {}", data_dir.display(), e);
        } else {
            tracing::debug!("Opened store in {}", data_dir.display());
        }

        Ok(Self {
            engine,
            preferences: PreferenceStore::new(slot, config.storage.preferences_key.clone()),
            chat: config.chat,
            data_dir,
            session: None,
        })
    }

    /// The chat session, built on first use. Fails while the engine is not ready.
    fn session(&mut self) -> Result<&mut ChatSession, Box<dyn Error>> {
        if self.session.is_none() {
            self.engine.initialize()?;
            let session = ChatSession::new(
                ChatRepository::new(self.engine.clone()),
                self.preferences.clone(),
                self.chat.clone(),
            )?;
            self.session = Some(session);
        }
        self.session
            .as_mut()
            .ok_or_else(|| Box::<dyn Error>::from("chat session unavailable"))
    }

    fn repository(&self) -> ChatRepository {
        ChatRepository::new(self.engine.clone())
    }

    pub fn status(&self) {
        let status = self.engine.status();
        println!("engine:        {}", status);
        if let Some(reason) = self.engine.failure() {
            println!("failure:       {}", reason);
            println!("               run `tanchat reset --yes` to start an empty database");
        }
        println!("data dir:      {}", self.data_dir.display());
        println!("snapshot key:  {}", self.engine.config().snapshot_key);
        println!("preferences:   {}", self.preferences.key());
        if status == EngineStatus::Ready {
            let repo = self.repository();
            if let (Ok(conversations), Ok(prompts)) = (repo.get_conversations(), repo.get_prompts()) {
                println!("conversations: {}", conversations.len());
                println!("prompts:       {}", prompts.len());
            }
        }
    }

    pub fn list(&mut self) -> CommandResult {
        let repo = self.session()?.repository().clone();
        for conversation in repo.get_conversations()? {
            println!(
                "{}\t{}\t{} messages",
                conversation.id,
                conversation.title,
                repo.count_messages(&conversation.id)?
            );
        }
        Ok(())
    }

    pub fn show(&mut self, id: &str) -> CommandResult {
        let session = self.session()?;
        let conversation = session
            .state()
            .conversation(id)
            .ok_or_else(|| format!("no conversation {}", id))?;
        println!("{}", serde_json::to_string_pretty(conversation)?);
        Ok(())
    }

    pub fn new_chat(&mut self) -> CommandResult {
        println!("{}", self.session()?.create_new_chat()?);
        Ok(())
    }

    pub fn rename(&mut self, id: &str, title: &str) -> CommandResult {
        Ok(self.session()?.rename_conversation(id, title)?)
    }

    pub fn delete(&mut self, id: &str) -> CommandResult {
        Ok(self.session()?.delete_conversation(id)?)
    }

    pub fn clear(&mut self) -> CommandResult {
        Ok(self.session()?.clear_all_chats()?)
    }

    pub fn send(&mut self, conversation: Option<&str>, reply: Option<String>, text: &str) -> CommandResult {
        let session = self.session()?;
        if let Some(id) = conversation {
            session.select_conversation(id)?;
        }
        let service = OfflineService::new(reply);
        match session.send_message(text, &service)? {
            Some(outcome) => {
                println!("conversation: {}", outcome.conversation_id);
                println!("{}", outcome.reply);
                if outcome.failed {
                    tracing::warn!("Stored the error reply in place of a model answer");
                }
            }
            None => println!("nothing to send"),
        }
        Ok(())
    }

    pub fn request(&mut self, id: &str) -> CommandResult {
        let request = self.session()?.build_request(id)?;
        println!("{}", serde_json::to_string_pretty(&request)?);
        Ok(())
    }

    pub fn prompts(&mut self) -> CommandResult {
        for prompt in &self.session()?.state().prompts {
            let marker = if prompt.is_active { "*" } else { " " };
            println!("{} {}\t{}\t{}", marker, prompt.id, prompt.name, prompt.content);
        }
        Ok(())
    }

    pub fn add_prompt(&mut self, name: &str, content: &str) -> CommandResult {
        println!("{}", self.session()?.create_prompt(name, content)?);
        Ok(())
    }

    pub fn update_prompt(&mut self, id: &str, name: &str, content: &str) -> CommandResult {
        Ok(self.session()?.update_prompt(id, name, content)?)
    }

    pub fn set_prompt_active(&mut self, id: &str, activate: bool) -> CommandResult {
        Ok(self.session()?.set_prompt_active(id, activate)?)
    }

    pub fn delete_prompt(&mut self, id: &str) -> CommandResult {
        Ok(self.session()?.delete_prompt(id)?)
    }

    pub fn get_setting(&self, key: &str) -> CommandResult {
        match self.repository().get_setting(key)? {
            Some(setting) => println!("{}\t(enabled: {})", setting.value, setting.enabled),
            None => println!("(unset)"),
        }
        Ok(())
    }

    pub fn set_setting(&self, key: &str, value: &str, enabled: bool) -> CommandResult {
        Ok(self.repository().set_setting(key, value, enabled)?)
    }

    pub fn get_user_setting(&self, key: &str) -> CommandResult {
        match self.repository().get_user_setting(key)? {
            Some(value) => println!("{}", value),
            None => println!("(unset)"),
        }
        Ok(())
    }

    pub fn set_user_setting(&self, key: &str, value: &str) -> CommandResult {
        Ok(self.repository().set_user_setting(key, value)?)
    }

    pub fn show_prefs(&self) -> CommandResult {
        let prefs = self.preferences.load();
        println!("model:     {}", prefs.model());
        println!("theme:     {}", prefs.theme());
        println!("reasoning: {}", serde_json::to_string(&prefs.reasoning())?);
        Ok(())
    }

    pub fn set_model(&mut self, id: &str) -> CommandResult {
        self.session()?.set_model(id)?;
        Ok(())
    }

    pub fn set_theme(&mut self, id: &str) -> CommandResult {
        self.session()?.set_theme(id)?;
        Ok(())
    }

    pub fn set_reasoning(&mut self, effort: &str, summary: &str) -> CommandResult {
        let config = ReasoningConfig {
            reasoning_effort: effort.parse::<ReasoningEffort>()?,
            reasoning_summary: summary.parse::<ReasoningSummary>()?,
        };
        self.session()?.set_reasoning(config)?;
        Ok(())
    }

    pub fn clear_prefs(&self) -> CommandResult {
        Ok(self.preferences.clear()?)
    }

    pub fn export(&self) -> CommandResult {
        println!("{}", self.engine.snapshot_text()?);
        Ok(())
    }

    /// Drop the stored database and start empty. Works from `Failed` too.
    pub fn reset(&mut self) -> CommandResult {
        self.session = None;
        self.engine.reset()?;
        self.engine.initialize()?;
        tracing::info!("Database reset in {}", self.data_dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(dir: &Path) -> App {
        // A config path that does not exist keeps the user's config out of tests.
        App::open(Some(&dir.join("config.toml")), Some(dir.join("data"))).unwrap()
    }

    #[test]
    fn corrupt_snapshot_is_reported_and_reset_recovers() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut app = open(dir.path());
            app.send(None, Some("Hello!".into()), "Hi").unwrap();
            app.set_theme("ocean").unwrap();
        }
        let snapshot = dir.path().join("data").join("chatdb.slot");
        std::fs::write(&snapshot, "garbage!!").unwrap();

        let mut app = open(dir.path());
        assert_eq!(app.engine.status(), EngineStatus::Failed);
        assert!(app.engine.failure().is_some());
        app.status();
        assert!(app.list().is_err());
        assert!(app.export().is_err());

        app.reset().unwrap();

        assert_eq!(app.engine.status(), EngineStatus::Ready);
        assert!(app.repository().get_conversations().unwrap().is_empty());
        assert_ne!(std::fs::read_to_string(&snapshot).unwrap(), "garbage!!");
        assert_eq!(app.preferences.load().theme(), "ocean");
        app.list().unwrap();

        let reopened = open(dir.path());
        assert_eq!(reopened.engine.status(), EngineStatus::Ready);
    }

    #[test]
    fn send_then_reopen_lists_the_conversation() {
        let dir = tempfile::tempdir().unwrap();
        open(dir.path()).send(None, Some("Hello!".into()), "Hi").unwrap();

        let app = open(dir.path());
        let conversations = app.repository().get_conversations().unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].title, "Hi");
        assert_eq!(
            app.repository().count_messages(&conversations[0].id).unwrap(),
            2
        );
    }
}
