//! Request/response types for model completions

use serde::{Deserialize, Serialize};

/// A single-turn completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier, e.g. `gpt-4`
    pub model: String,

    /// Full prompt text, sent as one user message
    pub prompt: String,

    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            max_tokens,
        }
    }
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    #[default]
    EndTurn,
    MaxTokens,
}

/// Token accounting for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Completion result
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated text; `None` when the provider returned no content
    pub content: Option<String>,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

impl CompletionResponse {
    /// Response carrying `text` and no usage
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_response() {
        let response = CompletionResponse::text("hello");
        assert_eq!(response.content.as_deref(), Some("hello"));
        assert_eq!(response.stop_reason, StopReason::EndTurn);
        assert_eq!(response.usage.total(), 0);
    }

    #[test]
    fn test_stop_reason_serialization() {
        assert_eq!(serde_json::to_string(&StopReason::MaxTokens).unwrap(), "\"max_tokens\"");
    }
}
