// Anthropic Claude provider
//
// Implementation of the Provider trait over Anthropic's Messages API, with
// streaming support via server-sent events.
//
// Structured output is requested through a system instruction asking for a
// single JSON document; the response text is parsed back into a value. The
// runtime validates the parsed output against the agent's schema, so this
// provider stays schema-agnostic.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use rewind_core::{
    MessageRole, Provider, ProviderChunk, ProviderError, ProviderRequest, ProviderResponse,
    ProviderStream, StopReason,
};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic Claude provider
///
/// # Example
///
/// ```ignore
/// use rewind_anthropic::AnthropicProvider;
///
/// let provider = AnthropicProvider::from_env()?;
/// // or
/// let provider = AnthropicProvider::new("your-api-key");
/// // or with custom endpoint
/// let provider = AnthropicProvider::with_base_url("your-api-key", "https://api.example.com/v1/messages");
/// ```
#[derive(Clone)]
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
}

impl AnthropicProvider {
    /// Create a new provider with the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create a new provider from the ANTHROPIC_API_KEY environment variable
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            ProviderError::AuthenticationFailed(
                "ANTHROPIC_API_KEY environment variable not set".to_string(),
            )
        })?;
        Ok(Self::new(api_key))
    }

    /// Create a new provider with a custom API URL
    pub fn with_base_url(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: api_url.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Override the default model used when a request carries none
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn build_request(&self, request: &ProviderRequest, stream: bool) -> AnthropicRequest {
        let mut system_parts: Vec<String> = Vec::new();
        let mut messages = Vec::new();

        for msg in &request.messages {
            match msg.role {
                // Anthropic handles the system prompt separately
                MessageRole::System => system_parts.push(msg.content.clone()),
                MessageRole::User => messages.push(AnthropicMessage {
                    role: "user".to_string(),
                    content: vec![AnthropicContentBlock::Text {
                        text: msg.content.clone(),
                    }],
                }),
                MessageRole::Assistant => messages.push(AnthropicMessage {
                    role: "assistant".to_string(),
                    content: vec![AnthropicContentBlock::Text {
                        text: msg.content.clone(),
                    }],
                }),
            }
        }

        if let Some(schema) = &request.output_format {
            system_parts.push(output_instruction(schema));
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        AnthropicRequest {
            model: request.model.clone().unwrap_or_else(|| self.model.clone()),
            messages,
            max_tokens: DEFAULT_MAX_TOKENS,
            system,
            stream,
        }
    }

    async fn send(&self, body: &AnthropicRequest) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(format!("failed to send request: {e}")))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn query(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        if request.abort.as_ref().is_some_and(|a| a.is_aborted()) {
            return Ok(ProviderResponse {
                events: Vec::new(),
                text: None,
                output: None,
                session_id: None,
                stop_reason: StopReason::Aborted,
            });
        }

        let wants_output = request.output_format.is_some();
        let body = self.build_request(&request, false);
        let response = self.send(&body).await?;

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Provider(format!("malformed response body: {e}")))?;

        let text: String = parsed
            .content
            .iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();

        let output = if wants_output {
            extract_json(&text)
        } else {
            None
        };

        Ok(ProviderResponse {
            events: Vec::new(),
            text: if text.is_empty() { None } else { Some(text) },
            output,
            session_id: None,
            stop_reason: convert_stop_reason(parsed.stop_reason.as_deref()),
        })
    }

    async fn query_stream(
        &self,
        request: ProviderRequest,
    ) -> Result<ProviderStream, ProviderError> {
        if request.abort.as_ref().is_some_and(|a| a.is_aborted()) {
            return Ok(Box::pin(futures::stream::iter([Ok(ProviderChunk::Stop {
                stop_reason: StopReason::Aborted,
            })])));
        }

        let body = self.build_request(&request, true);
        let response = self.send(&body).await?;

        let event_stream = response.bytes_stream().eventsource();

        let current_tool = Arc::new(Mutex::new(Option::<PendingToolUse>::None));
        let stop_reason = Arc::new(Mutex::new(StopReason::EndTurn));

        let chunks = event_stream
            .map(move |result| {
                let current_tool = Arc::clone(&current_tool);
                let stop_reason = Arc::clone(&stop_reason);

                let event = match result {
                    Ok(event) => event,
                    Err(e) => {
                        return Some(Err(ProviderError::Network(format!("stream error: {e}"))))
                    }
                };

                match event.event.as_str() {
                    "content_block_start" => {
                        if let Ok(data) =
                            serde_json::from_str::<ContentBlockStart>(&event.data)
                        {
                            if let ContentBlockInfo::ToolUse { id, name } = data.content_block {
                                *current_tool.lock().expect("tool state lock poisoned") =
                                    Some(PendingToolUse {
                                        id,
                                        name,
                                        input_json: String::new(),
                                    });
                            }
                        }
                        None
                    }
                    "content_block_delta" => {
                        let data =
                            serde_json::from_str::<ContentBlockDeltaEvent>(&event.data).ok()?;
                        match data.delta {
                            ContentDelta::TextDelta { text } => {
                                Some(Ok(ProviderChunk::Text { text }))
                            }
                            ContentDelta::InputJsonDelta { partial_json } => {
                                let mut current =
                                    current_tool.lock().expect("tool state lock poisoned");
                                if let Some(tool) = current.as_mut() {
                                    tool.input_json.push_str(&partial_json);
                                }
                                None
                            }
                        }
                    }
                    "content_block_stop" => {
                        let taken = current_tool
                            .lock()
                            .expect("tool state lock poisoned")
                            .take();
                        taken.map(|tool| {
                            let input =
                                serde_json::from_str(&tool.input_json).unwrap_or_else(|_| json!({}));
                            Ok(ProviderChunk::ToolUse {
                                id: tool.id,
                                name: tool.name,
                                input,
                            })
                        })
                    }
                    "message_delta" => {
                        if let Ok(data) = serde_json::from_str::<MessageDelta>(&event.data) {
                            if let Some(reason) = data.delta.stop_reason {
                                *stop_reason.lock().expect("stop reason lock poisoned") =
                                    convert_stop_reason(Some(&reason));
                            }
                        }
                        None
                    }
                    "message_stop" => {
                        let reason = stop_reason
                            .lock()
                            .expect("stop reason lock poisoned")
                            .clone();
                        Some(Ok(ProviderChunk::Stop {
                            stop_reason: reason,
                        }))
                    }
                    "error" => Some(Err(ProviderError::Provider(format!(
                        "Anthropic stream error: {}",
                        event.data
                    )))),
                    // message_start, ping, and unknown event types carry nothing we need
                    _ => None,
                }
            })
            .filter_map(|item| async move { item });

        Ok(Box::pin(chunks))
    }
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

// ============================================================================
// Response handling helpers
// ============================================================================

fn output_instruction(schema: &Value) -> String {
    format!(
        "Respond with a single JSON document matching this schema, and nothing else:\n{schema}"
    )
}

/// Parse the response text as a JSON document, tolerating a fenced code block
pub(crate) fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    let fenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))?
        .strip_suffix("```")?;
    serde_json::from_str(fenced.trim()).ok()
}

fn convert_stop_reason(reason: Option<&str>) -> StopReason {
    match reason {
        None | Some("end_turn") | Some("stop_sequence") => StopReason::EndTurn,
        Some("max_tokens") => StopReason::MaxTokens,
        Some("tool_use") => StopReason::ToolUse,
        Some(other) => StopReason::Other(other.to_string()),
    }
}

/// Map an unsuccessful HTTP response onto the typed error taxonomy
async fn error_from_response(response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs);

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<AnthropicErrorBody>(&body)
        .map(|b| b.error.message)
        .unwrap_or(body);

    match status.as_u16() {
        401 | 403 => ProviderError::AuthenticationFailed(message),
        429 => ProviderError::RateLimited {
            message,
            retry_after,
        },
        400 => {
            // Anthropic reports context overflow as an invalid_request_error
            if message.contains("too long") || message.contains("context") {
                ProviderError::ContextLengthExceeded(message)
            } else {
                ProviderError::InvalidRequest(message)
            }
        }
        _ => ProviderError::Provider(format!("Anthropic API error ({status}): {message}")),
    }
}

// ============================================================================
// Anthropic API types
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

// Streaming response types

struct PendingToolUse {
    id: String,
    name: String,
    input_json: String,
}

#[derive(Debug, Deserialize)]
struct ContentBlockStart {
    content_block: ContentBlockInfo,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
#[allow(dead_code)]
enum ContentBlockInfo {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String },
}

#[derive(Debug, Deserialize)]
struct ContentBlockDeltaEvent {
    delta: ContentDelta,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentDelta {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(rename = "input_json_delta")]
    InputJsonDelta { partial_json: String },
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    delta: MessageDeltaData,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaData {
    stop_reason: Option<String>,
}
