// LLM provider contract
//
// Provider-agnostic types for querying a language model. The runtime treats
// the provider as an external collaborator: it awaits `query` during agent
// activation and never inspects provider internals. Failures are typed with
// explicit retryable semantics so callers decide whether to retry.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::event::Event;

// ============================================================================
// Request / response types
// ============================================================================

/// Message role for provider calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Message format for provider calls (provider-agnostic)
#[derive(Debug, Clone)]
pub struct ProviderMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ProviderMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Cooperative cancellation flag shared between a caller and an async operation
///
/// Cloned handles observe the same flag. The runtime loop checks it between
/// events; providers check it before dispatching a request and resolve an
/// already-aborted query with `StopReason::Aborted`.
#[derive(Clone, Debug, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A provider query
#[derive(Debug, Clone, Default)]
pub struct ProviderRequest {
    pub messages: Vec<ProviderMessage>,
    /// Model override; providers fall back to their configured default
    pub model: Option<String>,
    /// JSON-Schema-shaped hint describing the expected structured output
    pub output_format: Option<Value>,
    /// Cancellation handle for the query
    pub abort: Option<AbortSignal>,
}

/// Why the provider stopped generating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    ToolUse,
    Aborted,
    Other(String),
}

/// Response from a provider query
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Events the provider produced itself; the runtime enqueues them ahead
    /// of the agent's translated output. Most providers return none.
    pub events: Vec<Event>,
    /// Plain text output, if any
    pub text: Option<String>,
    /// Structured output, if the request asked for one
    pub output: Option<Value>,
    /// Provider-side session id, when the provider maintains one
    pub session_id: Option<Uuid>,
    pub stop_reason: StopReason,
}

/// Chunks yielded by the streaming variant
#[derive(Debug, Clone)]
pub enum ProviderChunk {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    Stop { stop_reason: StopReason },
}

/// Type alias for the provider chunk stream
pub type ProviderStream =
    Pin<Box<dyn Stream<Item = Result<ProviderChunk, ProviderError>> + Send>>;

// ============================================================================
// Errors
// ============================================================================

/// Typed provider failures
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Context length exceeded: {0}")]
    ContextLengthExceeded(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider error: {0}")]
    Provider(String),
}

impl ProviderError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            ProviderError::RateLimited { .. } => "RATE_LIMITED",
            ProviderError::ContextLengthExceeded(_) => "CONTEXT_LENGTH_EXCEEDED",
            ProviderError::InvalidRequest(_) => "INVALID_REQUEST",
            ProviderError::Network(_) => "NETWORK_ERROR",
            ProviderError::AuthenticationFailed(_) => "AUTHENTICATION_FAILED",
            ProviderError::Provider(_) => "PROVIDER_ERROR",
        }
    }

    /// Whether the caller may retry the same request
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. }
                | ProviderError::Network(_)
                | ProviderError::Provider(_)
        )
    }

    /// Suggested backoff before retrying, if the provider supplied one
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

// ============================================================================
// Provider trait
// ============================================================================

/// Trait for LLM providers
///
/// Implementations handle provider-specific API calls and response parsing.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Query the model and await the full response
    async fn query(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// Query the model with a streaming response
    ///
    /// The default implementation degrades to a single-chunk stream built
    /// from `query`.
    async fn query_stream(
        &self,
        request: ProviderRequest,
    ) -> Result<ProviderStream, ProviderError> {
        let response = self.query(request).await?;
        let mut chunks = Vec::new();
        if let Some(text) = response.text {
            chunks.push(Ok(ProviderChunk::Text { text }));
        }
        chunks.push(Ok(ProviderChunk::Stop {
            stop_reason: response.stop_reason,
        }));
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

// ============================================================================
// ScriptedProvider - canned responses for tests and examples
// ============================================================================

/// Provider that replays a fixed script of responses
///
/// Each query pops the next scripted result; an exhausted script yields
/// `PROVIDER_ERROR`. Requests are captured for assertions.
#[derive(Default)]
pub struct ScriptedProvider {
    script: std::sync::Mutex<std::collections::VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: std::sync::Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful structured-output response
    pub fn respond_with_output(self, output: Value) -> Self {
        self.push(Ok(ProviderResponse {
            events: Vec::new(),
            text: None,
            output: Some(output),
            session_id: None,
            stop_reason: StopReason::EndTurn,
        }));
        self
    }

    /// Queue a successful plain-text response
    pub fn respond_with_text(self, text: impl Into<String>) -> Self {
        self.push(Ok(ProviderResponse {
            events: Vec::new(),
            text: Some(text.into()),
            output: None,
            session_id: None,
            stop_reason: StopReason::EndTurn,
        }));
        self
    }

    /// Queue a full response shape, for scripts that carry provider events
    pub fn respond(self, response: ProviderResponse) -> Self {
        self.push(Ok(response));
        self
    }

    /// Queue a failure
    pub fn respond_with_error(self, error: ProviderError) -> Self {
        self.push(Err(error));
        self
    }

    fn push(&self, entry: Result<ProviderResponse, ProviderError>) {
        self.script
            .lock()
            .expect("scripted provider lock poisoned")
            .push_back(entry);
    }

    /// Requests observed so far
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests
            .lock()
            .expect("scripted provider lock poisoned")
            .clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn query(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests
            .lock()
            .expect("scripted provider lock poisoned")
            .push(request);
        self.script
            .lock()
            .expect("scripted provider lock poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Err(ProviderError::Provider(
                    "scripted provider exhausted".to_string(),
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_codes_and_retryability() {
        let rate_limited = ProviderError::RateLimited {
            message: "slow down".to_string(),
            retry_after: Some(Duration::from_secs(30)),
        };
        assert_eq!(rate_limited.code(), "RATE_LIMITED");
        assert!(rate_limited.retryable());
        assert_eq!(rate_limited.retry_after(), Some(Duration::from_secs(30)));

        let auth = ProviderError::AuthenticationFailed("bad key".to_string());
        assert_eq!(auth.code(), "AUTHENTICATION_FAILED");
        assert!(!auth.retryable());
        assert!(auth.retry_after().is_none());

        let invalid = ProviderError::InvalidRequest("bad body".to_string());
        assert!(!invalid.retryable());

        let network = ProviderError::Network("timeout".to_string());
        assert!(network.retryable());
    }

    #[tokio::test]
    async fn test_scripted_provider_replays_in_order() {
        let provider = ScriptedProvider::new()
            .respond_with_output(json!({"plan": "a"}))
            .respond_with_error(ProviderError::Network("down".to_string()));

        let first = provider.query(ProviderRequest::default()).await.unwrap();
        assert_eq!(first.output, Some(json!({"plan": "a"})));
        assert_eq!(first.stop_reason, StopReason::EndTurn);

        let second = provider.query(ProviderRequest::default()).await.unwrap_err();
        assert_eq!(second.code(), "NETWORK_ERROR");

        let third = provider.query(ProviderRequest::default()).await.unwrap_err();
        assert_eq!(third.code(), "PROVIDER_ERROR");

        assert_eq!(provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_scripted_provider_replays_provider_events() {
        let provider = ScriptedProvider::new().respond(ProviderResponse {
            events: vec![Event::new("provider:note", json!({"note": "cached"}))],
            text: None,
            output: Some(json!({"plan": "a"})),
            session_id: None,
            stop_reason: StopReason::EndTurn,
        });

        let abort = AbortSignal::new();
        let request = ProviderRequest {
            abort: Some(abort.clone()),
            ..ProviderRequest::default()
        };
        let response = provider.query(request).await.unwrap();
        assert_eq!(response.events.len(), 1);
        assert_eq!(response.events[0].name, "provider:note");
        assert_eq!(response.output, Some(json!({"plan": "a"})));

        // The captured request carries the caller's abort handle
        let captured = provider.requests();
        let handle = captured[0].abort.as_ref().unwrap();
        assert!(!handle.is_aborted());
        abort.abort();
        assert!(handle.is_aborted());
    }

    #[tokio::test]
    async fn test_default_stream_degrades_to_single_chunk() {
        use futures::StreamExt;

        let provider = ScriptedProvider::new().respond_with_text("hello");
        let mut stream = provider
            .query_stream(ProviderRequest::default())
            .await
            .unwrap();

        let mut text = String::new();
        let mut stopped = false;
        while let Some(chunk) = stream.next().await {
            match chunk.unwrap() {
                ProviderChunk::Text { text: t } => text.push_str(&t),
                ProviderChunk::Stop { .. } => stopped = true,
                ProviderChunk::ToolUse { .. } => {}
            }
        }
        assert_eq!(text, "hello");
        assert!(stopped);
    }
}
