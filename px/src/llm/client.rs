//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// Stateless model client - each call is independent
///
/// One prompt in, one response out. The executor wraps calls in its own
/// retry policy, so implementations should make exactly one attempt.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

/// Scripted client for tests and offline runs
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tracing::debug;

    /// Returns queued responses in order, then fails
    pub struct MockLlmClient {
        responses: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
        requests: Mutex<Vec<CompletionRequest>>,
        call_count: AtomicUsize,
        delay: Option<Duration>,
    }

    impl MockLlmClient {
        pub fn new(responses: Vec<Result<CompletionResponse, LlmError>>) -> Self {
            debug!(response_count = %responses.len(), "MockLlmClient::new: called");
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
                call_count: AtomicUsize::new(0),
                delay: None,
            }
        }

        /// Wait `delay` before answering each call
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Client answering each call with the next text in `texts`
        pub fn with_texts<I, S>(texts: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self::new(texts.into_iter().map(|t| Ok(CompletionResponse::text(t))).collect())
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Every request received so far
        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }

        /// Prompts received so far
        pub fn prompts(&self) -> Vec<String> {
            self.requests().into_iter().map(|r| r.prompt).collect()
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            debug!(%idx, model = %request.model, "MockLlmClient::complete: called");
            self.requests.lock().unwrap_or_else(|e| e.into_inner()).push(request);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            self.responses
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::InvalidResponse("No more mock responses".to_string())))
        }
    }

}
