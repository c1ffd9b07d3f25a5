// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Handles environment variables, deployment modes, and runtime configuration parsing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Environment-based configuration management for production deployment

use crate::constants::{defaults, env_vars};
use crate::mentor::SafetyDirectiveMode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Environment type for security and other configurations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Which document store backs profile lookups
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStoreBackend {
    /// Google Cloud Firestore over REST
    Firestore,
    /// Process-local map, optionally seeded from a JSON file
    Memory,
}

impl DocumentStoreBackend {
    /// Parse the `DOCUMENT_STORE` value
    ///
    /// # Errors
    ///
    /// Returns an error for unknown backend names
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "memory" | "demo" => Ok(Self::Memory),
            other => Err(anyhow::anyhow!(
                "Unknown DOCUMENT_STORE '{other}' (expected 'firestore' or 'memory')"
            )),
        }
    }
}

impl std::fmt::Display for DocumentStoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Firestore => write!(f, "firestore"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Language model endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL (Ollama by default)
    pub base_url: String,
    /// Optional bearer key
    pub api_key: Option<String>,
    /// Chat model
    pub chat_model: String,
    /// Vision model used by the food analyzer
    pub vision_model: String,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Completion token limit
    pub max_tokens: Option<u32>,
    /// Deadline applied to every model call
    pub model_timeout_secs: u64,
}

impl LlmConfig {
    /// Deadline applied to every model call
    #[must_use]
    pub const fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }
}

/// Firebase project settings shared by Firestore and token verification
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirebaseConfig {
    /// Project id (Firestore database owner and token audience)
    pub project_id: Option<String>,
    /// Service account JSON used to mint Firestore access tokens
    pub credentials_path: Option<PathBuf>,
    /// Static OAuth access token, used instead of a service account
    pub access_token: Option<String>,
    /// Firestore emulator `host:port`
    pub emulator_host: Option<String>,
    /// Require verified Firebase ID tokens on API routes
    pub auth_enabled: bool,
}

/// Document store selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStoreConfig {
    /// Selected backend
    pub backend: DocumentStoreBackend,
    /// JSON seed file for the in-memory backend
    pub seed_path: Option<PathBuf>,
}

/// Top-level server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// HTTP API port
    pub http_port: u16,
    /// Deployment environment
    pub environment: Environment,
    /// Model endpoint
    pub llm: LlmConfig,
    /// Firebase project settings
    pub firebase: FirebaseConfig,
    /// Document store selection
    pub documents: DocumentStoreConfig,
    /// Allowed CORS origins (`*` allows any)
    pub cors_origins: Vec<String>,
    /// Which safety directives the prompt carries
    pub safety_directives: SafetyDirectiveMode,
    /// Food image upload limit in bytes
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or validation fails
    pub fn from_env() -> Result<Self> {
        let project_id = env_var_opt(env_vars::FIREBASE_PROJECT_ID);
        let default_backend = if project_id.is_some() {
            "firestore"
        } else {
            "memory"
        };

        let config = Self {
            host: env_var_or(env_vars::HOST, defaults::HOST),
            http_port: env_var_or(env_vars::HTTP_PORT, &defaults::HTTP_PORT.to_string())
                .parse()
                .context("Invalid HTTP_PORT value")?,
            environment: Environment::from_str_or_default(&env_var_or(
                env_vars::ENVIRONMENT,
                "development",
            )),
            llm: LlmConfig {
                base_url: env_var_or(env_vars::LLM_BASE_URL, defaults::LLM_BASE_URL),
                api_key: env_var_opt(env_vars::LLM_API_KEY),
                chat_model: env_var_or(env_vars::LLM_CHAT_MODEL, defaults::CHAT_MODEL),
                vision_model: env_var_or(env_vars::LLM_VISION_MODEL, defaults::VISION_MODEL),
                temperature: env_var_opt(env_vars::LLM_TEMPERATURE)
                    .map(|value| value.parse())
                    .transpose()
                    .context("Invalid LLM_TEMPERATURE value")?,
                max_tokens: env_var_opt(env_vars::LLM_MAX_TOKENS)
                    .map(|value| value.parse())
                    .transpose()
                    .context("Invalid LLM_MAX_TOKENS value")?,
                model_timeout_secs: env_var_or(
                    env_vars::MODEL_TIMEOUT_SECS,
                    &defaults::MODEL_TIMEOUT_SECS.to_string(),
                )
                .parse()
                .context("Invalid MODEL_TIMEOUT_SECS value")?,
            },
            firebase: FirebaseConfig {
                project_id,
                credentials_path: env_var_opt(env_vars::FIREBASE_CREDENTIALS_PATH)
                    .map(PathBuf::from),
                access_token: env_var_opt(env_vars::FIRESTORE_ACCESS_TOKEN),
                emulator_host: env_var_opt(env_vars::FIRESTORE_EMULATOR_HOST),
                auth_enabled: env_var_or(env_vars::AUTH_ENABLED, "false")
                    .parse()
                    .context("Invalid AUTH_ENABLED value")?,
            },
            documents: DocumentStoreConfig {
                backend: DocumentStoreBackend::parse(&env_var_or(
                    env_vars::DOCUMENT_STORE,
                    default_backend,
                ))?,
                seed_path: env_var_opt(env_vars::DOCUMENT_SEED_PATH).map(PathBuf::from),
            },
            cors_origins: parse_origins(&env_var_or(
                env_vars::CORS_ALLOWED_ORIGINS,
                defaults::CORS_ORIGINS,
            )),
            safety_directives: SafetyDirectiveMode::parse(&env_var_or(
                env_vars::SAFETY_DIRECTIVES,
                "all",
            ))?,
            max_upload_bytes: env_var_or(
                env_vars::MAX_UPLOAD_BYTES,
                &defaults::MAX_UPLOAD_BYTES.to_string(),
            )
            .parse()
            .context("Invalid MAX_UPLOAD_BYTES value")?,
        };

        config.validate()?;
        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting
    pub fn validate(&self) -> Result<()> {
        if self.http_port == 0 {
            return Err(anyhow::anyhow!("HTTP_PORT must be non-zero"));
        }

        if self.llm.model_timeout_secs == 0 {
            return Err(anyhow::anyhow!("MODEL_TIMEOUT_SECS must be non-zero"));
        }

        if self.llm.model_timeout_secs > defaults::MAX_MODEL_TIMEOUT_SECS {
            return Err(anyhow::anyhow!(
                "MODEL_TIMEOUT_SECS must be at most {}, got {}",
                defaults::MAX_MODEL_TIMEOUT_SECS,
                self.llm.model_timeout_secs
            ));
        }

        url::Url::parse(&self.llm.base_url)
            .with_context(|| format!("LLM_BASE_URL '{}' is not a valid URL", self.llm.base_url))?;

        if let Some(temperature) = self.llm.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(anyhow::anyhow!(
                    "LLM_TEMPERATURE must be between 0.0 and 2.0, got {temperature}"
                ));
            }
        }

        if self.documents.backend == DocumentStoreBackend::Firestore
            && self.firebase.project_id.is_none()
        {
            return Err(anyhow::anyhow!(
                "DOCUMENT_STORE=firestore requires FIREBASE_PROJECT_ID"
            ));
        }

        if self.firebase.auth_enabled && self.firebase.project_id.is_none() {
            return Err(anyhow::anyhow!(
                "AUTH_ENABLED=true requires FIREBASE_PROJECT_ID"
            ));
        }

        if self.documents.backend == DocumentStoreBackend::Memory {
            warn!("Running with the in-memory document store; profiles are not persisted");
        }

        if self.environment.is_production() && !self.firebase.auth_enabled {
            warn!("Production environment without AUTH_ENABLED; API routes are unauthenticated");
        }

        Ok(())
    }

    /// Get a summary of the configuration for logging (without secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Health Mentor Server Configuration:\n\
             - Listen: {}:{}\n\
             - Environment: {}\n\
             - Model Endpoint: {}\n\
             - Chat Model: {}\n\
             - Vision Model: {}\n\
             - Model Timeout: {}s\n\
             - Document Store: {}\n\
             - Firebase Project: {}\n\
             - Token Verification: {}\n\
             - Safety Directives: {}\n\
             - CORS Origins: {}",
            self.host,
            self.http_port,
            self.environment,
            self.llm.base_url,
            self.llm.chat_model,
            self.llm.vision_model,
            self.llm.model_timeout_secs,
            self.documents.backend,
            self.firebase.project_id.as_deref().unwrap_or("not set"),
            if self.firebase.auth_enabled {
                "Enabled"
            } else {
                "Disabled"
            },
            self.safety_directives,
            self.cors_origins.join(", "),
        )
    }
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Get a non-empty environment variable
fn env_var_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Parse comma-separated CORS origins
fn parse_origins(origins_str: &str) -> Vec<String> {
    if origins_str.trim() == "*" {
        vec!["*".to_owned()]
    } else {
        origins_str
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect()
    }
}
