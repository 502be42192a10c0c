//! OpenAI-compatible chat-completions client
//!
//! Makes exactly one HTTP attempt per call; retries belong to the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StopReason, TokenUsage};
use crate::config::LlmConfig;

/// OpenAI API client
pub struct OpenAIClient {
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAIClient {
    /// Create a new client from configuration
    ///
    /// Fails if the API key environment variable is not set.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(base_url = %config.base_url, "OpenAIClient::from_config: called");
        let api_key = config.api_key().map_err(|e| LlmError::Config(e.to_string()))?;

        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_tokens: config.max_tokens,
            timeout,
        })
    }

    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(model = %request.model, %request.max_tokens, "OpenAIClient::build_request_body: called");
        let max_tokens = request.max_tokens.min(self.max_tokens);

        // o-series and gpt-5 models reject max_tokens
        let uses_completion_tokens =
            request.model.starts_with("gpt-5") || request.model.starts_with("o1") || request.model.starts_with("o3");

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": [{ "role": "user", "content": request.prompt }],
        });

        if uses_completion_tokens {
            body["max_completion_tokens"] = serde_json::json!(max_tokens);
        } else {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        body
    }

    fn parse_response(api_response: OpenAIResponse) -> Result<CompletionResponse, LlmError> {
        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        let choice = api_response.choices.into_iter().next().ok_or(LlmError::NoContent)?;
        let content = choice.message.content.filter(|c| !c.is_empty()).ok_or(LlmError::NoContent)?;
        let stop_reason = match choice.finish_reason.as_deref() {
            Some("length") => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        };

        Ok(CompletionResponse {
            content: Some(content),
            stop_reason,
            usage,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(model = %request.model, prompt_len = request.prompt.len(), "OpenAIClient::complete: called");
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_request_body(&request);

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout)
                } else {
                    LlmError::Network(e)
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            debug!("OpenAIClient::complete: rate limited (429)");
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(0);

            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !response.status().is_success() {
            debug!(%status, "OpenAIClient::complete: API error");
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError { status, message: text });
        }

        let api_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        debug!("OpenAIClient::complete: success");
        Self::parse_response(api_response)
    }
}

// OpenAI API response types

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(max_tokens: u32) -> OpenAIClient {
        OpenAIClient {
            api_key: "test-key".to_string(),
            base_url: "https://api.openai.com".to_string(),
            http: Client::new(),
            max_tokens,
            timeout: Duration::from_secs(300),
        }
    }

    #[test]
    fn test_build_request_body_basic() {
        let body = client(8192).build_request_body(&CompletionRequest::new("gpt-4", "Hello", 1000));

        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Hello");
        assert!(body["messages"].as_array().unwrap().len() == 1);
    }

    #[test]
    fn test_max_tokens_capped() {
        let body = client(1000).build_request_body(&CompletionRequest::new("gpt-4", "Test", 5000));
        assert_eq!(body["max_tokens"], 1000);

        let body = client(1000).build_request_body(&CompletionRequest::new("o3-mini", "Test", 500));
        assert_eq!(body["max_completion_tokens"], 500);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_parse_response() {
        let raw = r#"{
            "choices": [{"message": {"content": "Hi there"}, "finish_reason": "length"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5}
        }"#;
        let parsed: OpenAIResponse = serde_json::from_str(raw).unwrap();
        let response = OpenAIClient::parse_response(parsed).unwrap();

        assert_eq!(response.content.as_deref(), Some("Hi there"));
        assert_eq!(response.stop_reason, StopReason::MaxTokens);
        assert_eq!(response.usage.total(), 15);
    }

    #[test]
    fn test_parse_response_without_content() {
        let raw = r#"{"choices": [{"message": {"content": null}, "finish_reason": "stop"}]}"#;
        let parsed: OpenAIResponse = serde_json::from_str(raw).unwrap();
        let err = OpenAIClient::parse_response(parsed).unwrap_err();
        assert!(matches!(err, LlmError::NoContent));

        let parsed: OpenAIResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(OpenAIClient::parse_response(parsed), Err(LlmError::NoContent)));
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = LlmConfig {
            api_key_env: "PLANEXEC_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..Default::default()
        };
        assert!(matches!(OpenAIClient::from_config(&config), Err(LlmError::Config(_))));
    }
}
