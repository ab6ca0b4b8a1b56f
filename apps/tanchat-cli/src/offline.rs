//! Completion service used when no model backend is wired in.

use tanchat_core::{CompletionError, CompletionReply, CompletionRequest, CompletionService};

/// Answers with a fixed reply, or fails so the apology is stored.
pub struct OfflineService {
    reply: Option<String>,
}

impl OfflineService {
    pub fn new(reply: Option<String>) -> Self {
        Self { reply }
    }
}

impl CompletionService for OfflineService {
    fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply, CompletionError> {
        match &self.reply {
            Some(text) => Ok(CompletionReply::Text(text.clone())),
            None => Err(CompletionError::Service(format!(
                "no completion backend for {} ({})",
                request.model,
                request.provider.as_str()
            ))),
        }
    }
}
