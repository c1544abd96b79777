//! HTTP-level tests for the provider backends against a local mock server.

use std::time::Duration;

use ai_client::{AiError, Claude, Completion, Gemini, JsonPrompt};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn prompt() -> JsonPrompt {
    JsonPrompt::new("Return a JSON array.", "[{\"comment_id\":\"c1\",\"text\":\"hi\"}]")
}

#[tokio::test]
async fn gemini_sends_json_mode_request_and_returns_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-test:generateContent"))
        .and(header("x-goog-api-key", "g-key"))
        .and(body_partial_json(json!({
            "generationConfig": {"responseMimeType": "application/json"},
            "systemInstruction": {"parts": [{"text": "Return a JSON array."}]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "[{\"product\":\"grok\"}]"}]},
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gemini = Gemini::new("g-key", "gemini-test").with_base_url(server.uri());
    let text = gemini.complete_json(&prompt()).await.unwrap();

    assert_eq!(text, "[{\"product\":\"grok\"}]");
}

#[tokio::test]
async fn gemini_forwards_response_schema() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "generationConfig": {"responseSchema": {"type": "array"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "[]"}]}, "finishReason": "STOP"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gemini = Gemini::new("g-key", "gemini-test").with_base_url(server.uri());
    let text = gemini
        .complete_json(&prompt().with_schema(json!({"type": "array"})))
        .await
        .unwrap();

    assert_eq!(text, "[]");
}

#[tokio::test]
async fn rate_limit_status_maps_to_rate_limited() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
        .mount(&server)
        .await;

    let gemini = Gemini::new("g-key", "gemini-test").with_base_url(server.uri());
    let err = gemini.complete_json(&prompt()).await.unwrap_err();

    assert!(matches!(err, AiError::RateLimited { retry_after: Some(30) }));
    assert!(err.is_transport());
}

#[tokio::test]
async fn server_error_carries_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let claude = Claude::new("sk-ant-test", "claude-test").with_base_url(server.uri());
    let err = claude.complete_json(&prompt()).await.unwrap_err();

    match err {
        AiError::Api { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "overloaded");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_provider_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"candidates": []}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let gemini = Gemini::new("g-key", "gemini-test")
        .with_base_url(server.uri())
        .with_timeout(Duration::from_millis(200));
    let err = gemini.complete_json(&prompt()).await.unwrap_err();

    assert!(matches!(err, AiError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn claude_sends_system_prompt_and_reads_text_blocks() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": "claude-test",
            "system": "Return a JSON array.",
            "temperature": 0.0,
            "max_tokens": 1024
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "```json\n[]\n```"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let claude = Claude::new("sk-ant-test", "claude-test")
        .with_base_url(server.uri())
        .with_max_tokens(1024);
    let text = claude.complete_json(&prompt()).await.unwrap();

    assert_eq!(text, "```json\n[]\n```");
}

#[tokio::test]
async fn claude_truncated_response_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "[{\"product\":"}],
            "stop_reason": "max_tokens"
        })))
        .mount(&server)
        .await;

    let claude = Claude::new("sk-ant-test", "claude-test").with_base_url(server.uri());
    let err = claude.complete_json(&prompt()).await.unwrap_err();

    assert!(matches!(err, AiError::EmptyResponse(_)));
    assert!(!err.is_transport());
}
