// ABOUTME: Integration tests for the OpenAI-compatible model client against a local fake endpoint
// ABOUTME: Validates request bodies, reply parsing, streaming, error mapping, and health checks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use health_mentor_server::config::LlmConfig;
use health_mentor_server::errors::ErrorCode;
use health_mentor_server::llm::{
    ChatMessage, ChatRequest, LlmCapabilities, LlmProvider, OpenAiCompatibleConfig,
    OpenAiCompatibleProvider,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

// =============================================================================
// Fake Endpoint
// =============================================================================

/// Requests seen by the fake endpoint: (authorization header, JSON body)
type Captured = Arc<Mutex<Vec<(Option<String>, Value)>>>;

/// What the fake endpoint answers to `POST /v1/chat/completions`
#[derive(Clone)]
enum Reply {
    Json(Value),
    Sse(&'static str),
    Status(StatusCode, &'static str),
}

#[derive(Clone)]
struct FakeState {
    reply: Reply,
    captured: Captured,
}

async fn completions(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> axum::response::Response {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned);
    state.captured.lock().unwrap().push((auth, body));

    match state.reply {
        Reply::Json(value) => Json(value).into_response(),
        Reply::Sse(body) => ([("content-type", "text/event-stream")], body).into_response(),
        Reply::Status(status, body) => (status, body).into_response(),
    }
}

async fn spawn_endpoint(reply: Reply) -> (String, Captured) {
    let captured: Captured = Arc::default();
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .route("/v1/models", get(|| async { Json(json!({"data": []})) }))
        .with_state(FakeState {
            reply,
            captured: Arc::clone(&captured),
        });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/v1"), captured)
}

fn provider(base_url: String, api_key: Option<&str>) -> OpenAiCompatibleProvider {
    OpenAiCompatibleProvider::new(OpenAiCompatibleConfig {
        base_url,
        api_key: api_key.map(ToOwned::to_owned),
        ..OpenAiCompatibleConfig::ollama("test-model")
    })
    .unwrap()
}

fn completion(content: &str) -> Value {
    json!({
        "model": "test-model",
        "choices": [{"message": {"role": "assistant", "content": content}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
    })
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_ollama_config_defaults() {
    let config = OpenAiCompatibleConfig::ollama("qwen2.5:7b");

    assert_eq!(config.base_url, "http://localhost:11434/v1");
    assert!(config.api_key.is_none());
    assert_eq!(config.default_model, "qwen2.5:7b");
    assert_eq!(config.provider_name, "ollama");
    assert_eq!(config.capabilities, LlmCapabilities::ollama());
    assert!(config
        .capabilities
        .contains(LlmCapabilities::VISION | LlmCapabilities::JSON_MODE));
}

#[test]
fn test_config_from_llm_settings() {
    let settings = LlmConfig {
        base_url: "https://models.example.com/v1".to_owned(),
        api_key: Some("sk-test".to_owned()),
        chat_model: "chat".to_owned(),
        vision_model: "vision".to_owned(),
        temperature: None,
        max_tokens: None,
        model_timeout_secs: 30,
    };
    let config = OpenAiCompatibleConfig::from_llm_config(&settings, "vision");

    assert_eq!(config.provider_name, "openai-compatible");
    assert_eq!(config.default_model, "vision");
    assert_eq!(config.api_key.as_deref(), Some("sk-test"));
    assert!(config.request_timeout > settings.model_timeout());
}

#[test]
fn test_request_timeout_saturates_for_huge_model_timeouts() {
    let settings = LlmConfig {
        base_url: "http://localhost:11434/v1".to_owned(),
        api_key: None,
        chat_model: "chat".to_owned(),
        vision_model: "vision".to_owned(),
        temperature: None,
        max_tokens: None,
        model_timeout_secs: u64::MAX,
    };
    let config = OpenAiCompatibleConfig::from_llm_config(&settings, "chat");

    assert!(config.request_timeout >= settings.model_timeout());
}

// =============================================================================
// Completions
// =============================================================================

#[tokio::test]
async fn test_complete_sends_openai_request() {
    let (base_url, captured) = spawn_endpoint(Reply::Json(completion("Walk daily."))).await;
    let client = provider(base_url, Some("secret"));

    let request = ChatRequest::new(vec![
        ChatMessage::system("You are a mentor."),
        ChatMessage::user("Advice?"),
    ])
    .with_model("kimi")
    .with_temperature(Some(0.5))
    .with_max_tokens(Some(256));
    let response = client.complete(&request).await.unwrap();

    assert_eq!(response.content, "Walk daily.");
    assert_eq!(response.usage.unwrap().total_tokens, 17);

    let (auth, body) = captured.lock().unwrap()[0].clone();
    assert_eq!(auth.as_deref(), Some("Bearer secret"));
    assert_eq!(body["model"], "kimi");
    assert_eq!(body["stream"], false);
    assert_eq!(body["max_tokens"], 256);
    assert_eq!(
        body["messages"],
        json!([
            {"role": "system", "content": "You are a mentor."},
            {"role": "user", "content": "Advice?"}
        ])
    );
    assert!(body.get("response_format").is_none());
}

#[tokio::test]
async fn test_vision_request_uses_parts_and_json_mode() {
    let (base_url, captured) = spawn_endpoint(Reply::Json(completion("{}"))).await;
    let client = provider(base_url, None);

    let request = ChatRequest::new(vec![
        ChatMessage::user("Analyze").with_image("data:image/jpeg;base64,AAAA")
    ])
    .with_json_mode();
    client.complete(&request).await.unwrap();

    let (auth, body) = captured.lock().unwrap()[0].clone();
    assert!(auth.is_none());
    assert_eq!(body["model"], "test-model");
    assert_eq!(body["response_format"], json!({"type": "json_object"}));
    assert_eq!(body["messages"][0]["content"][1]["type"], "image_url");
}

#[tokio::test]
async fn test_complete_stream_yields_deltas() {
    let sse = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"},\"finish_reason\":null}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Rest \"},\"finish_reason\":null}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"well.\"},\"finish_reason\":null}]}\n\n",
        "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );
    let (base_url, captured) = spawn_endpoint(Reply::Sse(sse)).await;
    let client = provider(base_url, None);

    let request = ChatRequest::new(vec![ChatMessage::user("Sleep?")]).with_streaming();
    let mut stream = client.complete_stream(&request).await.unwrap();

    let mut text = String::new();
    let mut finals = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.unwrap();
        text.push_str(&chunk.delta);
        if chunk.is_final {
            finals += 1;
        }
    }
    assert_eq!(text, "Rest well.");
    assert!(finals >= 1);
    assert_eq!(captured.lock().unwrap()[0].1["stream"], true);
}

#[tokio::test]
async fn test_mid_stream_error_is_reported() {
    let sse = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Par\"},\"finish_reason\":null}]}\n\n",
        "data: {\"error\":{\"message\":\"model crashed\"}}\n\n",
    );
    let (base_url, _captured) = spawn_endpoint(Reply::Sse(sse)).await;
    let client = provider(base_url, None);

    let request = ChatRequest::new(vec![ChatMessage::user("Hi")]).with_streaming();
    let items: Vec<_> = client.complete_stream(&request).await.unwrap().collect().await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap().delta, "Par");
    let error = items[1].as_ref().unwrap_err();
    assert!(error.message.contains("model crashed"));
}

// =============================================================================
// Error Mapping
// =============================================================================

#[tokio::test]
async fn test_error_statuses_map_to_error_codes() {
    let cases = [
        (StatusCode::UNAUTHORIZED, ErrorCode::ExternalAuthFailed),
        (StatusCode::TOO_MANY_REQUESTS, ErrorCode::ExternalRateLimited),
        (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::ExternalServiceUnavailable),
        (StatusCode::BAD_REQUEST, ErrorCode::ExternalServiceError),
    ];

    for (status, expected) in cases {
        let (base_url, _captured) =
            spawn_endpoint(Reply::Status(status, r#"{"error":"model is loading"}"#)).await;
        let client = provider(base_url, None);

        let error = client
            .complete(&ChatRequest::new(vec![ChatMessage::user("Hi")]))
            .await
            .unwrap_err();
        assert_eq!(error.code, expected, "status {status}");
        assert!(error.message.contains("model is loading"));
    }
}

#[tokio::test]
async fn test_unreachable_endpoint_is_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = provider(format!("http://{addr}/v1"), None);
    let error = client
        .complete(&ChatRequest::new(vec![ChatMessage::user("Hi")]))
        .await
        .unwrap_err();

    assert_eq!(error.code, ErrorCode::ExternalServiceUnavailable);
    assert!(client.health_check().await.is_err());
}

#[tokio::test]
async fn test_health_check_lists_models() {
    let (base_url, _captured) = spawn_endpoint(Reply::Json(completion("unused"))).await;
    let client = provider(base_url, None);

    assert!(client.health_check().await.unwrap());
}
