//! Shaping of completion requests.
//!
//! The remote model call itself lives outside this crate behind
//! [`CompletionService`]. This module decides what gets sent: which
//! transcript messages survive, the system prompt, and the provider.

use serde::{Deserialize, Serialize};
use tanchat_store::{Message, Prompt, Role};

use crate::preferences::ReasoningConfig;

/// Base instructions sent with every request.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are TanStack Chat, an AI assistant using Markdown for clear and structured responses. Format your responses following these guidelines:

1. Use headers for sections:
   # For main topics
   ## For subtopics
   ### For subsections

2. For lists and steps:
   - Use bullet points for unordered lists
   - Number steps when sequence matters
   
3. For code:
   - Use inline `code` for short snippets
   - Use triple backticks with language for blocks:
   ```python
   def example():
       return "like this"
   ```

4. For emphasis:
   - Use **bold** for important points
   - Use *italics* for emphasis
   - Use > for important quotes or callouts

5. For structured data:
   | Use | Tables |
   |-----|---------|
   | When | Needed |

6. Break up long responses with:
   - Clear section headers
   - Appropriate spacing between sections
   - Bullet points for better readability
   - Short, focused paragraphs

7. For technical content:
   - Always specify language for code blocks
   - Use inline `code` for technical terms
   - Include example usage where helpful

Keep responses concise and well-structured. Use appropriate Markdown formatting to enhance readability and understanding."#;

/// Assistant messages starting with this were substituted after a failed
/// call and are never sent back to the model.
pub const APOLOGY_PREFIX: &str = "Sorry, I encountered an error";

/// Errors raised while shaping or running a completion.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("No valid messages to send")]
    EmptyTranscript,

    #[error("Received empty response from the model")]
    EmptyReply,

    #[error("Completion service error: {0}")]
    Service(String),
}

/// Backend family serving a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl Provider {
    /// Infer the provider from a model id.
    pub fn for_model(model: &str) -> Self {
        if model.starts_with("o3") || model.contains("gpt") {
            Provider::OpenAi
        } else {
            Provider::Anthropic
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
        }
    }
}

/// A transcript entry as sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

/// Everything the completion service needs for one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub messages: Vec<ChatTurn>,
    pub system_prompt: String,
    pub model: String,
    pub provider: Provider,
    pub reasoning: ReasoningConfig,
}

impl CompletionRequest {
    /// Build a request from a stored transcript.
    ///
    /// Empty messages and earlier apology replies are dropped. When nothing
    /// remains the request is refused with `EmptyTranscript`.
    pub fn build(
        transcript: &[Message],
        base_prompt: &str,
        active_prompt: Option<&Prompt>,
        model: &str,
        reasoning: ReasoningConfig,
    ) -> Result<Self, CompletionError> {
        let messages: Vec<ChatTurn> = transcript
            .iter()
            .filter(|m| !m.content.trim().is_empty() && !m.content.starts_with(APOLOGY_PREFIX))
            .map(|m| ChatTurn {
                role: m.role,
                content: m.content.clone(),
            })
            .collect();
        if messages.is_empty() {
            return Err(CompletionError::EmptyTranscript);
        }

        let system_prompt = match active_prompt {
            Some(prompt) => format!("{}\n\n{}", base_prompt, prompt.content),
            None => base_prompt.to_string(),
        };

        Ok(Self {
            messages,
            system_prompt,
            model: model.to_string(),
            provider: Provider::for_model(model),
            reasoning,
        })
    }
}

/// Fragments of a streamed reply.
pub type ReplyStream = Box<dyn Iterator<Item = Result<String, CompletionError>> + Send>;

/// What a completion service hands back.
pub enum CompletionReply {
    Text(String),
    Stream(ReplyStream),
}

impl CompletionReply {
    /// Collapse the reply into one string, failing if it is blank.
    pub fn into_text(self) -> Result<String, CompletionError> {
        let text = match self {
            CompletionReply::Text(text) => text,
            CompletionReply::Stream(fragments) => {
                let mut text = String::new();
                for fragment in fragments {
                    text.push_str(&fragment?);
                }
                text
            }
        };
        if text.trim().is_empty() {
            return Err(CompletionError::EmptyReply);
        }
        Ok(text)
    }
}

impl std::fmt::Debug for CompletionReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionReply::Text(text) => f.debug_tuple("Text").field(text).finish(),
            CompletionReply::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// The remote model, as seen by the session.
pub trait CompletionService {
    fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply, CompletionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, role: Role, content: &str) -> Message {
        Message {
            id: id.into(),
            conversation_id: "c".into(),
            role,
            content: content.into(),
            created_at: 0,
        }
    }

    fn prompt(content: &str) -> Prompt {
        Prompt {
            id: "p".into(),
            name: "n".into(),
            content: content.into(),
            is_active: true,
            created_at: 0,
        }
    }

    #[test]
    fn provider_detection() {
        assert_eq!(Provider::for_model("o3-mini"), Provider::OpenAi);
        assert_eq!(Provider::for_model("gpt-4o"), Provider::OpenAi);
        assert_eq!(Provider::for_model("chatgpt-latest"), Provider::OpenAi);
        assert_eq!(Provider::for_model("grok-4"), Provider::Anthropic);
        assert_eq!(Provider::for_model("claude-4-sonnet"), Provider::Anthropic);
    }

    #[test]
    fn drops_blank_and_apology_messages() {
        let transcript = vec![
            message("1", Role::User, "Hi"),
            message("2", Role::Assistant, "Sorry, I encountered an error processing your request."),
            message("3", Role::User, "   "),
            message("4", Role::User, "Still there?"),
        ];
        let request = CompletionRequest::build(
            &transcript,
            DEFAULT_SYSTEM_PROMPT,
            None,
            "grok-4",
            ReasoningConfig::default(),
        )
        .unwrap();

        let contents: Vec<&str> = request.messages.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["Hi", "Still there?"]);
        assert_eq!(request.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(request.provider, Provider::Anthropic);
    }

    #[test]
    fn active_prompt_is_appended() {
        let transcript = vec![message("1", Role::User, "Hi")];
        let request = CompletionRequest::build(
            &transcript,
            "base",
            Some(&prompt("Talk like a pirate")),
            "gpt-4o",
            ReasoningConfig::default(),
        )
        .unwrap();
        assert_eq!(request.system_prompt, "base\n\nTalk like a pirate");
        assert_eq!(request.provider, Provider::OpenAi);
    }

    #[test]
    fn only_apologies_is_an_empty_transcript() {
        let transcript = vec![message(
            "1",
            Role::Assistant,
            "Sorry, I encountered an error processing your request.",
        )];
        let err = CompletionRequest::build(&transcript, "base", None, "m", ReasoningConfig::default())
            .unwrap_err();
        assert!(matches!(err, CompletionError::EmptyTranscript));
    }

    #[test]
    fn stream_fragments_are_joined() {
        let fragments = vec![Ok("Hel".to_string()), Ok("lo".to_string())];
        let reply = CompletionReply::Stream(Box::new(fragments.into_iter()));
        assert_eq!(reply.into_text().unwrap(), "Hello");
    }

    #[test]
    fn blank_reply_and_stream_errors_fail() {
        assert!(matches!(
            CompletionReply::Text("  \n".into()).into_text(),
            Err(CompletionError::EmptyReply)
        ));
        let fragments = vec![
            Ok("partial".to_string()),
            Err(CompletionError::Service("connection reset".into())),
        ];
        assert!(matches!(
            CompletionReply::Stream(Box::new(fragments.into_iter())).into_text(),
            Err(CompletionError::Service(_))
        ));
    }
}
