//! LLM Provider Abstraction Layer
//!
//! This module provides the interface the pipeline uses to reach the
//! external generation capability. The GenerationProvider trait is the
//! contract; `openai.rs` implements it against any OpenAI-compatible
//! chat-completions endpoint. Helpers here parse the structured intent
//! output that models return in varying shapes (bare JSON, fenced JSON).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod openai;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Message in a generation request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender (user, assistant, system)
    pub role: MessageRole,

    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message
    User,

    /// Assistant message
    Assistant,

    /// System message
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// Text-in, text-out generation capability.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "openai")
    fn name(&self) -> &str;

    /// Generate a completion for the given messages.
    async fn generate(&self, messages: &[Message]) -> Result<String>;
}

/// Parse a predicted-intents list out of model output.
///
/// Accepts, in order of preference:
/// 1. A JSON object with an `intents` array: `{"intents": ["...", "..."]}`
/// 2. A bare JSON array of strings
/// 3. Either of the above inside a markdown code fence
///
/// Anything else yields an empty list; the caller degrades rather than
/// failing the request.
pub fn parse_intent_list(content: &str) -> Vec<String> {
    let trimmed = content.trim();

    if let Some(intents) = try_parse_intents_json(trimmed) {
        return intents;
    }

    if let Some(inner) = extract_fenced_block(trimmed) {
        if let Some(intents) = try_parse_intents_json(inner.trim()) {
            return intents;
        }
    }

    Vec::new()
}

/// Try to parse a string as `{"intents": [...]}` or a bare string array.
fn try_parse_intents_json(s: &str) -> Option<Vec<String>> {
    let json: serde_json::Value = serde_json::from_str(s).ok()?;
    let array = match &json {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(_) => json.get("intents")?.as_array()?,
        _ => return None,
    };
    Some(
        array
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

/// Extract the body of the first markdown code fence in the text.
///
/// Works even when there is trailing prose after the closing ```.
/// Returns `None` if no fenced block is found.
fn extract_fenced_block(content: &str) -> Option<&str> {
    // Find opening fence
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start_rel = after_opening.find('\n')? + 1;
    let body_start = fence_start + 3 + body_start_rel;

    // Find closing fence after the body starts
    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let user_msg = Message::user("Hello");
        assert_eq!(user_msg.role, MessageRole::User);
        assert_eq!(user_msg.content, "Hello");

        let system_msg = Message::system("You answer from context");
        assert_eq!(system_msg.role, MessageRole::System);
    }

    #[test]
    fn test_parse_intents_object() {
        let intents = parse_intent_list(r#"{"intents": ["What is X?", "How does Y work?"]}"#);
        assert_eq!(intents, vec!["What is X?", "How does Y work?"]);
    }

    #[test]
    fn test_parse_intents_bare_array() {
        let intents = parse_intent_list(r#"["one", "two", "three"]"#);
        assert_eq!(intents.len(), 3);
    }

    #[test]
    fn test_parse_intents_fenced() {
        let content = "Here you go:\n```json\n{\"intents\": [\"follow-up\"]}\n```\nDone.";
        assert_eq!(parse_intent_list(content), vec!["follow-up"]);
    }

    #[test]
    fn test_parse_intents_garbage_is_empty() {
        assert!(parse_intent_list("I could not decide.").is_empty());
        assert!(parse_intent_list("").is_empty());
        assert!(parse_intent_list(r#"{"answers": ["not intents"]}"#).is_empty());
    }

    #[test]
    fn test_parse_intents_skips_non_strings_and_empties() {
        let intents = parse_intent_list(r#"{"intents": ["ok", 42, "", "also ok"]}"#);
        assert_eq!(intents, vec!["ok", "also ok"]);
    }

    #[test]
    fn test_extract_fenced_block() {
        let body = extract_fenced_block("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(body.trim(), "{\"a\": 1}");
        assert!(extract_fenced_block("no fences here").is_none());
    }
}
