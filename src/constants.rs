// ABOUTME: System-wide constants and configuration defaults for the health mentor server
// ABOUTME: Contains service identity, environment variable names, and runtime defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Constants Module
//!
//! Default values used when an environment variable is unset, plus the names of
//! the variables themselves so configuration loading and tests agree on them.

pub use health_mentor_core::constants::{collections, fallback_text, fields, profile_defaults};

/// Service identity
pub mod service {
    /// Service name reported in logs and health checks
    pub const SERVICE_NAME: &str = "health-mentor-server";
    /// Server version from Cargo.toml
    pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// Runtime defaults
pub mod defaults {
    /// Bind address
    pub const HOST: &str = "0.0.0.0";
    /// HTTP listener port
    pub const HTTP_PORT: u16 = 8000;
    /// OpenAI-compatible endpoint exposed by a local Ollama daemon
    pub const LLM_BASE_URL: &str = "http://localhost:11434/v1";
    /// Chat model used for mentor conversations
    pub const CHAT_MODEL: &str = "kimi-k2:1t-cloud";
    /// Vision model used for food image analysis
    pub const VISION_MODEL: &str = "qwen3-vl:235b-instruct-cloud";
    /// Upper bound for a single model call
    pub const MODEL_TIMEOUT_SECS: u64 = 120;
    /// Largest accepted model timeout (one hour)
    pub const MAX_MODEL_TIMEOUT_SECS: u64 = 3600;
    /// Largest accepted food image upload (10 MiB)
    pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
    /// Default allowed CORS origins
    pub const CORS_ORIGINS: &str = "*";
}

/// Environment variable names
pub mod env_vars {
    /// Bind address
    pub const HOST: &str = "HOST";
    /// HTTP listener port
    pub const HTTP_PORT: &str = "HTTP_PORT";
    /// Deployment environment
    pub const ENVIRONMENT: &str = "ENVIRONMENT";
    /// Model endpoint base URL
    pub const LLM_BASE_URL: &str = "LLM_BASE_URL";
    /// Optional model endpoint key
    pub const LLM_API_KEY: &str = "LLM_API_KEY";
    /// Chat model
    pub const LLM_CHAT_MODEL: &str = "LLM_CHAT_MODEL";
    /// Vision model
    pub const LLM_VISION_MODEL: &str = "LLM_VISION_MODEL";
    /// Sampling temperature
    pub const LLM_TEMPERATURE: &str = "LLM_TEMPERATURE";
    /// Completion token limit
    pub const LLM_MAX_TOKENS: &str = "LLM_MAX_TOKENS";
    /// Model call deadline in seconds
    pub const MODEL_TIMEOUT_SECS: &str = "MODEL_TIMEOUT_SECS";
    /// Document store backend selector
    pub const DOCUMENT_STORE: &str = "DOCUMENT_STORE";
    /// JSON seed file for the in-memory store
    pub const DOCUMENT_SEED_PATH: &str = "DOCUMENT_SEED_PATH";
    /// Firebase project id
    pub const FIREBASE_PROJECT_ID: &str = "FIREBASE_PROJECT_ID";
    /// Service account JSON path
    pub const FIREBASE_CREDENTIALS_PATH: &str = "FIREBASE_CREDENTIALS_PATH";
    /// Static Firestore OAuth token
    pub const FIRESTORE_ACCESS_TOKEN: &str = "FIRESTORE_ACCESS_TOKEN";
    /// Firestore emulator address
    pub const FIRESTORE_EMULATOR_HOST: &str = "FIRESTORE_EMULATOR_HOST";
    /// Require Firebase ID tokens on API routes
    pub const AUTH_ENABLED: &str = "AUTH_ENABLED";
    /// Comma-separated CORS origins
    pub const CORS_ALLOWED_ORIGINS: &str = "CORS_ALLOWED_ORIGINS";
    /// Safety directive selection
    pub const SAFETY_DIRECTIVES: &str = "SAFETY_DIRECTIVES";
    /// Food image upload limit
    pub const MAX_UPLOAD_BYTES: &str = "MAX_UPLOAD_BYTES";
}

/// HTTP route paths
pub mod routes {
    /// Register a verified user
    pub const SIGNUP: &str = "/auth/signup";
    /// Record a sign-in
    pub const LOGIN: &str = "/auth/login";
    /// Complete chat turn
    pub const CHAT: &str = "/chat";
    /// Streamed chat turn
    pub const CHAT_STREAM: &str = "/chat/stream";
    /// Conversation history lookup
    pub const CONVERSATION: &str = "/chat/conversations/:conversation_id";
    /// Food image analysis
    pub const NUTRITION_ANALYZE: &str = "/nutrition/analyze";
    /// Liveness probe
    pub const HEALTH: &str = "/health";
    /// Readiness probe
    pub const READY: &str = "/ready";
}
