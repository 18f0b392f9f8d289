// Unit tests for the Anthropic provider

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rewind_core::{
    AbortSignal, Provider, ProviderError, ProviderMessage, ProviderRequest, StopReason,
};

use crate::provider::extract_json;
use crate::AnthropicProvider;

fn messages_url(server: &MockServer) -> String {
    format!("{}/v1/messages", server.uri())
}

fn text_request(content: &str) -> ProviderRequest {
    ProviderRequest {
        messages: vec![ProviderMessage::user(content)],
        model: None,
        output_format: None,
        abort: None,
    }
}

fn success_body(text: &str, stop_reason: &str) -> serde_json::Value {
    json!({
        "content": [{"type": "text", "text": text}],
        "stop_reason": stop_reason,
    })
}

#[test]
fn test_debug_redacts_api_key() {
    let provider = AnthropicProvider::new("sk-secret");
    let repr = format!("{provider:?}");
    assert!(repr.contains("[REDACTED]"));
    assert!(!repr.contains("sk-secret"));
}

#[tokio::test]
async fn test_query_sends_auth_headers_and_returns_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body("hello", "end_turn")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AnthropicProvider::with_base_url("test-key", messages_url(&server));
    let response = provider.query(text_request("hi")).await.unwrap();

    assert_eq!(response.text.as_deref(), Some("hello"));
    assert!(response.output.is_none());
    assert_eq!(response.stop_reason, StopReason::EndTurn);
}

#[tokio::test]
async fn test_query_parses_structured_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(success_body(r#"{"plan": "ship it"}"#, "end_turn")),
        )
        .mount(&server)
        .await;

    let provider = AnthropicProvider::with_base_url("test-key", messages_url(&server));
    let request = ProviderRequest {
        messages: vec![ProviderMessage::user("plan the task")],
        model: None,
        output_format: Some(json!({"type": "object"})),
        abort: None,
    };
    let response = provider.query(request).await.unwrap();

    assert_eq!(response.output, Some(json!({"plan": "ship it"})));
}

#[tokio::test]
async fn test_model_override_reaches_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(json!({"model": "claude-3-5-haiku-20241022"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body("ok", "end_turn")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AnthropicProvider::with_base_url("test-key", messages_url(&server));
    let request = ProviderRequest {
        messages: vec![ProviderMessage::user("hi")],
        model: Some("claude-3-5-haiku-20241022".to_string()),
        output_format: None,
        abort: None,
    };
    provider.query(request).await.unwrap();
}

#[tokio::test]
async fn test_system_messages_leave_the_messages_array() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(json!({
            "system": "be terse",
            "messages": [{"role": "user", "content": [{"type": "text", "text": "hi"}]}],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body("ok", "end_turn")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AnthropicProvider::with_base_url("test-key", messages_url(&server));
    let request = ProviderRequest {
        messages: vec![ProviderMessage::system("be terse"), ProviderMessage::user("hi")],
        model: None,
        output_format: None,
        abort: None,
    };
    provider.query(request).await.unwrap();
}

#[tokio::test]
async fn test_aborted_request_resolves_without_hitting_the_api() {
    // port 9 is unreachable; an already-aborted query must not get that far
    let provider = AnthropicProvider::with_base_url("test-key", "http://127.0.0.1:9/v1/messages");
    let abort = AbortSignal::new();
    abort.abort();

    let mut request = text_request("hi");
    request.abort = Some(abort);
    let response = provider.query(request).await.unwrap();

    assert_eq!(response.stop_reason, StopReason::Aborted);
    assert!(response.text.is_none());
    assert!(response.events.is_empty());
}

#[tokio::test]
async fn test_unauthorized_maps_to_authentication_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"type": "authentication_error", "message": "invalid x-api-key"}
        })))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::with_base_url("bad-key", messages_url(&server));
    let err = provider.query(text_request("hi")).await.unwrap_err();

    assert_eq!(err.code(), "AUTHENTICATION_FAILED");
    assert!(!err.retryable());
    assert!(err.to_string().contains("invalid x-api-key"));
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "7")
                .set_body_json(json!({
                    "error": {"type": "rate_limit_error", "message": "rate limited"}
                })),
        )
        .mount(&server)
        .await;

    let provider = AnthropicProvider::with_base_url("test-key", messages_url(&server));
    let err = provider.query(text_request("hi")).await.unwrap_err();

    assert_eq!(err.code(), "RATE_LIMITED");
    assert!(err.retryable());
    assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
}

#[tokio::test]
async fn test_context_overflow_maps_to_context_length_exceeded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"type": "invalid_request_error", "message": "prompt is too long"}
        })))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::with_base_url("test-key", messages_url(&server));
    let err = provider.query(text_request("hi")).await.unwrap_err();

    assert!(matches!(err, ProviderError::ContextLengthExceeded(_)));
    assert!(!err.retryable());
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::with_base_url("test-key", messages_url(&server));
    let err = provider.query(text_request("hi")).await.unwrap_err();

    assert_eq!(err.code(), "PROVIDER_ERROR");
    assert!(err.retryable());
}

#[tokio::test]
async fn test_unreachable_endpoint_maps_to_network_error() {
    // Nothing listens on this port
    let provider =
        AnthropicProvider::with_base_url("test-key", "http://127.0.0.1:9/v1/messages");
    let err = provider.query(text_request("hi")).await.unwrap_err();
    assert_eq!(err.code(), "NETWORK_ERROR");
}

#[test]
fn test_extract_json_tolerates_code_fences() {
    assert_eq!(
        extract_json(r#"{"a": 1}"#),
        Some(json!({"a": 1}))
    );
    assert_eq!(
        extract_json("```json\n{\"a\": 1}\n```"),
        Some(json!({"a": 1}))
    );
    assert_eq!(
        extract_json("```\n{\"a\": 1}\n```"),
        Some(json!({"a": 1}))
    );
    assert_eq!(extract_json("not json"), None);
}

#[tokio::test]
async fn test_query_stream_yields_text_and_stop() {
    use futures::StreamExt;
    use rewind_core::ProviderChunk;

    let sse_body = concat!(
        "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{}}\n\n",
        "event: content_block_start\ndata: {\"type\":\"content_block_start\",\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
        "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"hel\"}}\n\n",
        "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"lo\"}}\n\n",
        "event: content_block_stop\ndata: {\"type\":\"content_block_stop\"}\n\n",
        "event: message_delta\ndata: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"}}\n\n",
        "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
    );

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_body),
        )
        .mount(&server)
        .await;

    let provider = AnthropicProvider::with_base_url("test-key", messages_url(&server));
    let mut stream = provider.query_stream(text_request("hi")).await.unwrap();

    let mut text = String::new();
    let mut stop = None;
    while let Some(chunk) = stream.next().await {
        match chunk.unwrap() {
            ProviderChunk::Text { text: t } => text.push_str(&t),
            ProviderChunk::Stop { stop_reason } => stop = Some(stop_reason),
            ProviderChunk::ToolUse { .. } => panic!("no tool use expected"),
        }
    }

    assert_eq!(text, "hello");
    assert_eq!(stop, Some(StopReason::EndTurn));
}

#[tokio::test]
async fn test_query_stream_accumulates_tool_input() {
    use futures::StreamExt;
    use rewind_core::ProviderChunk;

    let sse_body = concat!(
        "event: content_block_start\ndata: {\"type\":\"content_block_start\",\"content_block\":{\"type\":\"tool_use\",\"id\":\"tu_1\",\"name\":\"lookup\"}}\n\n",
        "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{\\\"city\\\":\"}}\n\n",
        "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"\\\"Oslo\\\"}\"}}\n\n",
        "event: content_block_stop\ndata: {\"type\":\"content_block_stop\"}\n\n",
        "event: message_delta\ndata: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"tool_use\"}}\n\n",
        "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
    );

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_body),
        )
        .mount(&server)
        .await;

    let provider = AnthropicProvider::with_base_url("test-key", messages_url(&server));
    let mut stream = provider.query_stream(text_request("weather?")).await.unwrap();

    let mut tool = None;
    let mut stop = None;
    while let Some(chunk) = stream.next().await {
        match chunk.unwrap() {
            ProviderChunk::ToolUse { id, name, input } => tool = Some((id, name, input)),
            ProviderChunk::Stop { stop_reason } => stop = Some(stop_reason),
            ProviderChunk::Text { .. } => {}
        }
    }

    assert_eq!(
        tool,
        Some((
            "tu_1".to_string(),
            "lookup".to_string(),
            json!({"city": "Oslo"})
        ))
    );
    assert_eq!(stop, Some(StopReason::ToolUse));
}
