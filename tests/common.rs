// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides test configuration, seeded user documents, and resource wiring
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `health_mentor_server`

use std::sync::{Arc, Once};
use std::time::Duration;

use health_mentor_server::auth::TokenVerifier;
use health_mentor_server::config::{
    DocumentStoreBackend, DocumentStoreConfig, Environment, FirebaseConfig, LlmConfig,
    ServerConfig,
};
use health_mentor_server::constants::defaults;
use health_mentor_server::documents::{DocumentStore, InMemoryDocumentStore};
use health_mentor_server::llm::LlmProvider;
use health_mentor_server::mentor::{
    InMemoryConversationStore, ModelSettings, ProfileLoader, PromptComposer, SafetyDirectiveMode,
    SessionOrchestrator,
};
use health_mentor_server::resources::ServerResources;
use serde_json::json;

static INIT_LOGGER: Once = Once::new();

/// User with a base record and a profile sub-record
pub const TEST_USER_ID: &str = "abc12345xyz";

/// User with a base record only
pub const BASE_ONLY_USER_ID: &str = "base-only-user";

/// User with no records at all
pub const UNKNOWN_USER_ID: &str = "ghost-user";

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Configuration for router tests; the model timeout is kept short
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_owned(),
        http_port: defaults::HTTP_PORT,
        environment: Environment::Testing,
        llm: LlmConfig {
            base_url: defaults::LLM_BASE_URL.to_owned(),
            api_key: None,
            chat_model: "test-chat-model".to_owned(),
            vision_model: "test-vision-model".to_owned(),
            temperature: Some(0.7),
            max_tokens: Some(512),
            model_timeout_secs: 2,
        },
        firebase: FirebaseConfig::default(),
        documents: DocumentStoreConfig {
            backend: DocumentStoreBackend::Memory,
            seed_path: None,
        },
        cors_origins: vec!["*".to_owned()],
        safety_directives: SafetyDirectiveMode::All,
        max_upload_bytes: 64 * 1024,
    }
}

/// Seed documents for the test users
pub fn seed() -> serde_json::Value {
    json!({
        format!("users/{TEST_USER_ID}"): {
            "age": 34,
            "gender": "Female",
            "weight_kg": 68.5,
            "height_cm": 170,
            "activity_level": "Active",
            "daily_step_goal": 12000
        },
        format!("users/{TEST_USER_ID}/profile/data"): {
            "has_hypertension": true,
            "has_diabetes": "yes",
            "allergies": "peanuts",
            "goal_type": "weight loss",
            "target_weight_kg": "62"
        },
        format!("users/{BASE_ONLY_USER_ID}"): {
            "age": "41",
            "gender": "Male"
        }
    })
}

/// In-memory document store holding [`seed`]
pub fn seeded_documents() -> Arc<InMemoryDocumentStore> {
    Arc::new(InMemoryDocumentStore::from_seed(seed()).expect("valid seed"))
}

/// Orchestrator over seeded documents and a fresh conversation store
pub fn create_test_orchestrator(
    provider: Arc<dyn LlmProvider>,
    timeout: Duration,
) -> SessionOrchestrator {
    init_test_logging();
    let documents: Arc<dyn DocumentStore> = seeded_documents();
    SessionOrchestrator::new(
        ProfileLoader::new(documents),
        PromptComposer::new(SafetyDirectiveMode::All),
        Arc::new(InMemoryConversationStore::new()),
        provider,
        ModelSettings {
            model: "test-chat-model".to_owned(),
            temperature: Some(0.7),
            max_tokens: Some(512),
            timeout,
        },
    )
}

/// Server resources over seeded documents
pub fn create_test_resources(
    provider: Arc<dyn LlmProvider>,
    verifier: Option<Arc<dyn TokenVerifier>>,
) -> Arc<ServerResources> {
    create_test_resources_with_documents(provider, verifier, seeded_documents())
}

/// Server resources over a caller-held document store
pub fn create_test_resources_with_documents(
    provider: Arc<dyn LlmProvider>,
    verifier: Option<Arc<dyn TokenVerifier>>,
    documents: Arc<dyn DocumentStore>,
) -> Arc<ServerResources> {
    init_test_logging();
    let mut config = test_config();
    config.firebase.auth_enabled = verifier.is_some();
    Arc::new(ServerResources::new(
        Arc::new(config),
        documents,
        Arc::new(InMemoryConversationStore::new()),
        provider,
        verifier,
    ))
}
