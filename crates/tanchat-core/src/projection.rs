//! In-memory view of the store consumed by the UI.
//!
//! Never authoritative. Rebuilt wholesale from the repository after every
//! action.

use serde::Serialize;
use tanchat_store::{ChatRepository, Conversation, Message, Prompt, Result};

/// A conversation with its messages in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationView {
    pub id: String,
    pub title: String,
    pub created_at: i64,
    pub messages: Vec<Message>,
}

impl ConversationView {
    fn from_parts(conversation: Conversation, messages: Vec<Message>) -> Self {
        Self {
            id: conversation.id,
            title: conversation.title,
            created_at: conversation.created_at,
            messages,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChatState {
    /// Newest first
    pub conversations: Vec<ConversationView>,
    /// Newest first
    pub prompts: Vec<Prompt>,
    pub current_conversation_id: Option<String>,
    /// A send is in flight
    pub is_loading: bool,
}

impl ChatState {
    /// Read every conversation, its messages, and the prompts.
    pub fn load(repo: &ChatRepository) -> Result<Self> {
        let conversations = repo
            .get_conversations()?
            .into_iter()
            .map(|c| {
                let messages = repo.get_messages_for_conversation(&c.id)?;
                Ok(ConversationView::from_parts(c, messages))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            conversations,
            prompts: repo.get_prompts()?,
            current_conversation_id: None,
            is_loading: false,
        })
    }

    /// Reload from the repository, keeping the selection when it still exists.
    pub fn refresh(&mut self, repo: &ChatRepository) -> Result<()> {
        let mut fresh = Self::load(repo)?;
        fresh.current_conversation_id = self
            .current_conversation_id
            .take()
            .filter(|id| fresh.conversation(id).is_some());
        fresh.is_loading = self.is_loading;
        *self = fresh;
        Ok(())
    }

    pub fn conversation(&self, id: &str) -> Option<&ConversationView> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn current_conversation(&self) -> Option<&ConversationView> {
        self.current_conversation_id
            .as_deref()
            .and_then(|id| self.conversation(id))
    }

    pub fn current_messages(&self) -> &[Message] {
        self.current_conversation()
            .map(|c| c.messages.as_slice())
            .unwrap_or(&[])
    }

    pub fn active_prompt(&self) -> Option<&Prompt> {
        self.prompts.iter().find(|p| p.is_active)
    }
}
