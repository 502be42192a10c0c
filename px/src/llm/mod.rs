//! Model provider clients
//!
//! The executor only sees [`LlmClient`]; [`create_client`] picks the
//! implementation named in config.

use std::sync::Arc;

use tracing::debug;

mod client;
mod error;
mod openai;
mod types;

pub use client::{LlmClient, mock};
pub use error::LlmError;
pub use openai::OpenAIClient;
pub use types::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};

use crate::config::LlmConfig;

/// Create a client for the provider specified in config
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, "create_client: called");
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIClient::from_config(config)?)),
        other => Err(LlmError::Config(format!(
            "Unknown LLM provider: '{}'. Supported: openai",
            other
        ))),
    }
}
