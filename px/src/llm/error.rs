//! LLM error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during model calls
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No content in model response")]
    NoContent,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Check if this error is worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } => true,
            LlmError::ApiError { status, .. } => *status == 408 || *status >= 500,
            LlmError::Network(_) => true,
            LlmError::Timeout(_) => true,
            LlmError::InvalidResponse(_) | LlmError::NoContent | LlmError::Config(_) => false,
        }
    }

    /// Minimum wait the provider asked for before the next attempt
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimited { retry_after } if !retry_after.is_zero() => Some(*retry_after),
            _ => None,
        }
    }
}
