// ABOUTME: Integration tests for the chat route handlers
// ABOUTME: Tests complete and streamed turns, owner-scoped history, error bodies, and bearer token checks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use common::{create_test_resources, BASE_ONLY_USER_ID, TEST_USER_ID, UNKNOWN_USER_ID};
use helpers::axum_test::AxumTestRequest;
use helpers::scripted_provider::{Script, ScriptedProvider};
use health_mentor_server::auth::{TokenVerifier, VerifiedIdentity};
use health_mentor_server::errors::{AppError, AppResult};
use health_mentor_server::routes::chat::ConversationResponse;
use health_mentor_server::server::MentorServer;
use serde_json::{json, Value};

// ============================================================================
// Test Helpers
// ============================================================================

const GOOD_TOKEN: &str = "good-token";
const OTHER_TOKEN: &str = "other-token";

/// Accepts [`GOOD_TOKEN`] as the test user, [`OTHER_TOKEN`] as the base-only
/// user, and rejects everything else
struct StaticVerifier;

#[async_trait]
impl TokenVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> AppResult<VerifiedIdentity> {
        let subject = match token {
            GOOD_TOKEN => TEST_USER_ID,
            OTHER_TOKEN => BASE_ONLY_USER_ID,
            _ => return Err(AppError::auth_invalid("Invalid ID token")),
        };
        Ok(VerifiedIdentity {
            subject_id: subject.to_owned(),
            email: Some("user@example.com".to_owned()),
        })
    }
}

fn history_uri(conversation_id: &str, user_id: &str) -> String {
    format!("/chat/conversations/{conversation_id}?user_id={user_id}")
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

fn setup(scripts: Vec<Script>) -> (Arc<ScriptedProvider>, Router) {
    let provider = Arc::new(ScriptedProvider::with_scripts(scripts));
    let resources = create_test_resources(provider.clone(), None);
    (provider, MentorServer::new(resources).router())
}

fn setup_with_auth(scripts: Vec<Script>) -> Router {
    let provider = Arc::new(ScriptedProvider::with_scripts(scripts));
    let resources = create_test_resources(provider, Some(Arc::new(StaticVerifier)));
    MentorServer::new(resources).router()
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().expect("error code")
}

// ============================================================================
// POST /chat
// ============================================================================

#[tokio::test]
async fn test_chat_returns_reply_and_conversation_id() {
    let (_provider, router) = setup(vec![Script::Reply("Eat more greens.".into())]);

    let response = AxumTestRequest::post("/chat")
        .json(&json!({"message": "Diet tips?", "user_id": TEST_USER_ID}))
        .send(router)
        .await;

    assert_eq!(response.status(), 200);
    assert!(response.header("x-request-id").is_some());
    let body: Value = response.json();
    assert_eq!(body["response"], "Eat more greens.");
    assert!(body["conversation_id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn test_chat_continues_supplied_conversation() {
    let (_provider, router) = setup(vec![Script::Reply("a".into()), Script::Reply("b".into())]);

    for message in ["one", "two"] {
        let response = AxumTestRequest::post("/chat")
            .json(&json!({
                "message": message,
                "user_id": TEST_USER_ID,
                "conversation_id": "conv-42"
            }))
            .send(router.clone())
            .await;
        assert_eq!(response.status(), 200);
    }

    let response = AxumTestRequest::get(&history_uri("conv-42", TEST_USER_ID))
        .send(router)
        .await;
    assert_eq!(response.status(), 200);
    let body: ConversationResponse = response.json();
    assert_eq!(body.conversation_id, "conv-42");
    let contents: Vec<&str> = body.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["one", "a", "two", "b"]);
}

#[tokio::test]
async fn test_chat_blank_message_is_bad_request() {
    let (provider, router) = setup(vec![]);

    let response = AxumTestRequest::post("/chat")
        .json(&json!({"message": "", "user_id": TEST_USER_ID}))
        .send(router)
        .await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json();
    assert_eq!(error_code(&body), "MISSING_REQUIRED_FIELD");
    assert!(body["error"]["request_id"].as_str().is_some());
    assert!(provider.requests().is_empty());
}

#[tokio::test]
async fn test_chat_malformed_body_is_bad_request() {
    let (_provider, router) = setup(vec![]);

    let missing_field = AxumTestRequest::post("/chat")
        .json(&json!({"message": "hi"}))
        .send(router.clone())
        .await;
    assert_eq!(missing_field.status(), 400);
    assert_eq!(error_code(&missing_field.json()), "INVALID_INPUT");

    let not_json = AxumTestRequest::post("/chat")
        .raw("application/json", "{not json")
        .send(router)
        .await;
    assert_eq!(not_json.status(), 400);
}

#[tokio::test]
async fn test_chat_unknown_user_is_not_found() {
    let (_provider, router) = setup(vec![]);

    let response = AxumTestRequest::post("/chat")
        .json(&json!({"message": "hi", "user_id": UNKNOWN_USER_ID}))
        .send(router)
        .await;

    assert_eq!(response.status(), 404);
    let body: Value = response.json();
    assert_eq!(error_code(&body), "RESOURCE_NOT_FOUND");
    assert_eq!(body["error"]["message"], "User profile not found");
}

#[tokio::test]
async fn test_chat_model_failure_is_server_error() {
    let (_provider, router) = setup(vec![Script::Fail("model crashed".into())]);

    let response = AxumTestRequest::post("/chat")
        .json(&json!({"message": "hi", "user_id": TEST_USER_ID}))
        .send(router)
        .await;

    assert_eq!(response.status(), 500);
    let body: Value = response.json();
    assert_eq!(error_code(&body), "MODEL_INVOCATION_FAILED");
}

// ============================================================================
// POST /chat/stream
// ============================================================================

#[tokio::test]
async fn test_stream_sends_sse_frames() {
    let (_provider, router) = setup(vec![Script::Chunks(vec![
        "Stretch ".into(),
        "daily.".into(),
    ])]);

    let response = AxumTestRequest::post("/chat/stream")
        .json(&json!({
            "message": "Mobility?",
            "user_id": TEST_USER_ID,
            "conversation_id": "stream-1"
        }))
        .send(router.clone())
        .await;

    assert_eq!(response.status(), 200);
    assert!(response
        .header("content-type")
        .is_some_and(|ct| ct.starts_with("text/event-stream")));

    let events = response.sse_events();
    assert_eq!(
        events,
        vec![
            json!({"type": "start", "conversation_id": "stream-1"}),
            json!({"type": "chunk", "content": "Stretch "}),
            json!({"type": "chunk", "content": "daily."}),
            json!({"type": "end"}),
        ]
    );

    let history: ConversationResponse = AxumTestRequest::get(&history_uri("stream-1", TEST_USER_ID))
        .send(router)
        .await
        .json();
    assert_eq!(history.messages.len(), 2);
    assert_eq!(history.messages[1].content, "Stretch daily.");
}

#[tokio::test]
async fn test_stream_failure_ends_with_error_frame() {
    let (_provider, router) = setup(vec![Script::ChunksThenFail(
        vec!["Half".into()],
        "socket closed".into(),
    )]);

    let response = AxumTestRequest::post("/chat/stream")
        .json(&json!({"message": "hi", "user_id": TEST_USER_ID}))
        .send(router)
        .await;

    assert_eq!(response.status(), 200);
    let events = response.sse_events();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0]["type"], "start");
    assert_eq!(events[1], json!({"type": "chunk", "content": "Half"}));
    assert_eq!(events[2]["type"], "error");
    assert!(events[2]["error"]
        .as_str()
        .is_some_and(|e| e.contains("socket closed")));
}

#[tokio::test]
async fn test_stream_unknown_user_is_plain_error() {
    let (_provider, router) = setup(vec![]);

    let response = AxumTestRequest::post("/chat/stream")
        .json(&json!({"message": "hi", "user_id": UNKNOWN_USER_ID}))
        .send(router)
        .await;

    assert_eq!(response.status(), 404);
    assert_eq!(error_code(&response.json()), "RESOURCE_NOT_FOUND");
}

// ============================================================================
// GET /chat/conversations/:conversation_id
// ============================================================================

#[tokio::test]
async fn test_unknown_conversation_is_not_found() {
    let (_provider, router) = setup(vec![]);

    let response = AxumTestRequest::get(&history_uri("missing", TEST_USER_ID))
        .send(router)
        .await;

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_history_without_caller_is_bad_request() {
    let (_provider, router) = setup(vec![]);

    let response = AxumTestRequest::get("/chat/conversations/anything")
        .send(router)
        .await;

    assert_eq!(response.status(), 400);
    assert_eq!(error_code(&response.json()), "MISSING_REQUIRED_FIELD");
}

#[tokio::test]
async fn test_history_for_another_user_is_not_found() {
    let (_provider, router) = setup(vec![Script::Reply("private".into())]);

    let response = AxumTestRequest::post("/chat")
        .json(&json!({
            "message": "hi",
            "user_id": TEST_USER_ID,
            "conversation_id": "mine"
        }))
        .send(router.clone())
        .await;
    assert_eq!(response.status(), 200);

    let response = AxumTestRequest::get(&history_uri("mine", BASE_ONLY_USER_ID))
        .send(router)
        .await;
    assert_eq!(response.status(), 404);
    assert_eq!(error_code(&response.json()), "RESOURCE_NOT_FOUND");
}

// ============================================================================
// Bearer Token Verification
// ============================================================================

#[tokio::test]
async fn test_missing_token_is_rejected_when_auth_enabled() {
    let router = setup_with_auth(vec![]);

    let response = AxumTestRequest::post("/chat")
        .json(&json!({"message": "hi", "user_id": TEST_USER_ID}))
        .send(router)
        .await;

    assert_eq!(response.status(), 401);
    assert_eq!(error_code(&response.json()), "AUTH_REQUIRED");
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let router = setup_with_auth(vec![]);

    let response = AxumTestRequest::post("/chat")
        .header("authorization", "Bearer forged")
        .json(&json!({"message": "hi", "user_id": TEST_USER_ID}))
        .send(router)
        .await;

    assert_eq!(response.status(), 401);
    assert_eq!(error_code(&response.json()), "AUTH_INVALID");
}

#[tokio::test]
async fn test_valid_token_for_own_profile_is_accepted() {
    let router = setup_with_auth(vec![Script::Reply("ok".into())]);

    let response = AxumTestRequest::post("/chat")
        .header("authorization", &format!("Bearer {GOOD_TOKEN}"))
        .json(&json!({"message": "hi", "user_id": TEST_USER_ID}))
        .send(router)
        .await;

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_token_for_another_user_is_rejected() {
    let router = setup_with_auth(vec![]);

    let response = AxumTestRequest::post("/chat")
        .header("authorization", &format!("Bearer {GOOD_TOKEN}"))
        .json(&json!({"message": "hi", "user_id": "someone-else"}))
        .send(router)
        .await;

    assert_eq!(response.status(), 401);
    assert_eq!(error_code(&response.json()), "AUTH_INVALID");
}

#[tokio::test]
async fn test_verified_user_cannot_read_another_users_conversation() {
    let router = setup_with_auth(vec![Script::Reply("private advice".into())]);

    let response = AxumTestRequest::post("/chat")
        .header("authorization", &bearer(GOOD_TOKEN))
        .json(&json!({
            "message": "my symptoms",
            "user_id": TEST_USER_ID,
            "conversation_id": "private-1"
        }))
        .send(router.clone())
        .await;
    assert_eq!(response.status(), 200);

    let response = AxumTestRequest::get("/chat/conversations/private-1")
        .header("authorization", &bearer(OTHER_TOKEN))
        .send(router.clone())
        .await;
    assert_eq!(response.status(), 404);
    assert_eq!(error_code(&response.json()), "RESOURCE_NOT_FOUND");

    let response = AxumTestRequest::get("/chat/conversations/private-1")
        .header("authorization", &bearer(GOOD_TOKEN))
        .send(router)
        .await;
    assert_eq!(response.status(), 200);
    let body: ConversationResponse = response.json();
    assert_eq!(body.messages.len(), 2);
}

#[tokio::test]
async fn test_verified_user_cannot_continue_another_users_conversation() {
    let router = setup_with_auth(vec![Script::Reply("private advice".into())]);

    let response = AxumTestRequest::post("/chat")
        .header("authorization", &bearer(GOOD_TOKEN))
        .json(&json!({
            "message": "my symptoms",
            "user_id": TEST_USER_ID,
            "conversation_id": "private-2"
        }))
        .send(router.clone())
        .await;
    assert_eq!(response.status(), 200);

    for path in ["/chat", "/chat/stream"] {
        let response = AxumTestRequest::post(path)
            .header("authorization", &bearer(OTHER_TOKEN))
            .json(&json!({
                "message": "append to it",
                "user_id": BASE_ONLY_USER_ID,
                "conversation_id": "private-2"
            }))
            .send(router.clone())
            .await;
        assert_eq!(response.status(), 404, "{path}");
        assert_eq!(error_code(&response.json()), "RESOURCE_NOT_FOUND");
    }

    let body: ConversationResponse = AxumTestRequest::get("/chat/conversations/private-2")
        .header("authorization", &bearer(GOOD_TOKEN))
        .send(router)
        .await
        .json();
    let contents: Vec<&str> = body.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["my symptoms", "private advice"]);
}

#[tokio::test]
async fn test_history_query_must_match_token_subject() {
    let router = setup_with_auth(vec![]);

    let response = AxumTestRequest::get(&history_uri("any", BASE_ONLY_USER_ID))
        .header("authorization", &bearer(GOOD_TOKEN))
        .send(router)
        .await;

    assert_eq!(response.status(), 401);
    assert_eq!(error_code(&response.json()), "AUTH_INVALID");
}

#[tokio::test]
async fn test_health_stays_open_when_auth_enabled() {
    let router = setup_with_auth(vec![]);

    let response = AxumTestRequest::get("/health").send(router).await;
    assert_eq!(response.status(), 200);
}
