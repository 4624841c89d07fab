//! Abstract model-provider interface.
//!
//! The concrete HTTP client that talks to an inference backend is an
//! external collaborator; this module only defines the `LlmProvider`
//! trait the agent loop calls against, and a test-support mock
//! implementation.

pub mod types;

use crate::errors::{CodeframeError, ModelError};
use async_trait::async_trait;
use types::{CompletionResponse, Message, Purpose, ToolDefinition};

/// Abstraction over a chat-completion backend. A real implementation lives
/// outside this crate; the agent loop only depends on this trait.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        purpose: Purpose,
        tools: &[ToolDefinition],
        max_tokens: usize,
        temperature: f32,
        system: &str,
    ) -> Result<CompletionResponse, CodeframeError>;
}

/// A queue-of-canned-responses provider for exercising the agent loop
/// without a live backend. Each call to `complete` pops the next queued
/// response, or invokes the handler if the queue is empty.
pub struct MockProvider {
    responses: std::sync::Mutex<std::collections::VecDeque<CompletionResponse>>,
    handler: Option<Box<dyn Fn(&[Message], Purpose) -> CompletionResponse + Send + Sync>>,
}

impl MockProvider {
    pub fn with_responses(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
            handler: None,
        }
    }

    pub fn with_handler(
        handler: impl Fn(&[Message], Purpose) -> CompletionResponse + Send + Sync + 'static,
    ) -> Self {
        Self {
            responses: std::sync::Mutex::new(Default::default()),
            handler: Some(Box::new(handler)),
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete(
        &self,
        messages: &[Message],
        purpose: Purpose,
        _tools: &[ToolDefinition],
        _max_tokens: usize,
        _temperature: f32,
        _system: &str,
    ) -> Result<CompletionResponse, CodeframeError> {
        if let Some(next) = self.responses.lock().unwrap().pop_front() {
            return Ok(next);
        }
        if let Some(handler) = &self.handler {
            return Ok(handler(messages, purpose));
        }
        Err(CodeframeError::Model(ModelError::Transport(
            "MockProvider exhausted with no handler configured".to_string(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_returns_queued_responses_in_order() {
        let provider = MockProvider::with_responses(vec![
            CompletionResponse {
                message: Message::assistant("first"),
            },
            CompletionResponse {
                message: Message::assistant("second"),
            },
        ]);
        let first = provider
            .complete(&[], Purpose::Execution, &[], 100, 0.0, "sys")
            .await
            .unwrap();
        assert_eq!(first.message.content, "first");
        let second = provider
            .complete(&[], Purpose::Execution, &[], 100, 0.0, "sys")
            .await
            .unwrap();
        assert_eq!(second.message.content, "second");
    }

    #[tokio::test]
    async fn test_mock_provider_errors_when_exhausted_without_handler() {
        let provider = MockProvider::with_responses(vec![]);
        let result = provider
            .complete(&[], Purpose::Execution, &[], 100, 0.0, "sys")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mock_provider_falls_back_to_handler() {
        let provider = MockProvider::with_handler(|_messages, _purpose| CompletionResponse {
            message: Message::assistant("handled"),
        });
        let response = provider
            .complete(&[], Purpose::Execution, &[], 100, 0.0, "sys")
            .await
            .unwrap();
        assert_eq!(response.message.content, "handled");
    }
}
