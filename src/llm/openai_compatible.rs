// ABOUTME: OpenAI-compatible LLM provider for Ollama and similar chat completion endpoints
// ABOUTME: Handles complete and SSE-streamed completions, image parts, and error mapping
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # `OpenAI`-Compatible Provider
//!
//! Talks to any endpoint implementing `POST {base}/chat/completions`. The
//! default target is Ollama's compatibility layer at
//! <http://localhost:11434/v1>, which serves both the chat model and the
//! vision model used for food images.
//!
//! Images are sent as `image_url` content parts carrying `data:` URLs, which
//! Ollama accepts for vision-capable models.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument, warn};

use super::sse_parser::create_sse_stream;
use super::{
    ChatMessage, ChatRequest, ChatResponse, ChatStream, LlmCapabilities, LlmProvider,
    StreamChunk, TokenUsage,
};
use crate::config::LlmConfig;
use crate::constants::defaults;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::logging::AppLogger;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Connection timeout (local servers may be waking a model up)
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Added to the model deadline for the HTTP client's own timeout
const REQUEST_TIMEOUT_MARGIN_SECS: u64 = 5;

/// Service label used in error messages
const SERVICE_LABEL: &str = "LLM";

// ============================================================================
// API Request/Response Types (OpenAI-compatible format)
// ============================================================================

/// OpenAI-compatible API request structure
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAiResponseFormat>,
}

#[derive(Debug, Serialize)]
struct OpenAiResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

/// Message structure for OpenAI-compatible API
#[derive(Debug, Clone, Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: OpenAiContent,
}

/// Plain text, or a list of parts when images are attached
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum OpenAiContent {
    Text(String),
    Parts(Vec<OpenAiContentPart>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OpenAiContentPart {
    Text { text: String },
    ImageUrl { image_url: OpenAiImageUrl },
}

#[derive(Debug, Clone, Serialize)]
struct OpenAiImageUrl {
    url: String,
}

impl From<&ChatMessage> for OpenAiMessage {
    fn from(msg: &ChatMessage) -> Self {
        let content = if msg.images.is_empty() {
            OpenAiContent::Text(msg.content.clone())
        } else {
            let mut parts = vec![OpenAiContentPart::Text {
                text: msg.content.clone(),
            }];
            parts.extend(msg.images.iter().map(|url| OpenAiContentPart::ImageUrl {
                image_url: OpenAiImageUrl { url: url.clone() },
            }));
            OpenAiContent::Parts(parts)
        };

        Self {
            role: msg.role.as_str(),
            content,
        }
    }
}

/// OpenAI-compatible API response structure
#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
    #[serde(default)]
    model: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(rename = "prompt_tokens")]
    prompt: u32,
    #[serde(rename = "completion_tokens")]
    completion: u32,
    #[serde(rename = "total_tokens")]
    total: u32,
}

/// Streaming chunk structure
#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Error response structure
#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorDetail,
}

/// Ollama reports `error` either as an object or as a bare string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OpenAiErrorDetail {
    Structured { message: String },
    Plain(String),
}

impl OpenAiErrorDetail {
    fn message(&self) -> &str {
        match self {
            Self::Structured { message, .. } | Self::Plain(message) => message,
        }
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Configuration for the `OpenAI`-compatible provider
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleConfig {
    /// Base URL for the API (e.g., <http://localhost:11434/v1>)
    pub base_url: String,
    /// API key (optional for local servers)
    pub api_key: Option<String>,
    /// Default model to use
    pub default_model: String,
    /// Provider name for logs and `/ready`
    pub provider_name: String,
    /// Capabilities of this provider
    pub capabilities: LlmCapabilities,
    /// Whole-request timeout enforced by the HTTP client
    pub request_timeout: Duration,
}

impl OpenAiCompatibleConfig {
    /// Create configuration for a local Ollama instance
    #[must_use]
    pub fn ollama(model: &str) -> Self {
        Self {
            default_model: model.to_owned(),
            ..Self::default()
        }
    }

    /// Create configuration from the server's model settings
    ///
    /// The HTTP timeout is set slightly above the model deadline so the
    /// orchestrator's deadline fires first and reports `ModelTimeout`.
    #[must_use]
    pub fn from_llm_config(config: &LlmConfig, model: &str) -> Self {
        let provider_name = if config.base_url.contains(":11434") {
            "ollama"
        } else {
            "openai-compatible"
        };

        Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            default_model: model.to_owned(),
            provider_name: provider_name.to_owned(),
            capabilities: LlmCapabilities::ollama(),
            request_timeout: config
                .model_timeout()
                .saturating_add(Duration::from_secs(REQUEST_TIMEOUT_MARGIN_SECS)),
        }
    }
}

impl Default for OpenAiCompatibleConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::LLM_BASE_URL.to_owned(),
            api_key: None,
            default_model: defaults::CHAT_MODEL.to_owned(),
            provider_name: "ollama".to_owned(),
            capabilities: LlmCapabilities::ollama(),
            request_timeout: Duration::from_secs(
                defaults::MODEL_TIMEOUT_SECS + REQUEST_TIMEOUT_MARGIN_SECS,
            ),
        }
    }
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Generic `OpenAI`-compatible LLM provider
pub struct OpenAiCompatibleProvider {
    client: Client,
    config: OpenAiCompatibleConfig,
}

impl OpenAiCompatibleProvider {
    /// Create a new provider with the given configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: OpenAiCompatibleConfig) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Name used in user-facing error messages
    fn label(&self) -> &str {
        if self.config.provider_name == "ollama" {
            "Ollama"
        } else {
            "the model endpoint"
        }
    }

    /// Build the API URL for a given endpoint
    fn api_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint
        )
    }

    fn build_request(&self, request: &ChatRequest, stream: bool) -> OpenAiRequest {
        let model = request
            .model
            .as_deref()
            .unwrap_or(&self.config.default_model);

        let response_format = (request.json_mode
            && self.config.capabilities.contains(LlmCapabilities::JSON_MODE))
            .then_some(OpenAiResponseFormat {
                format_type: "json_object",
            });

        OpenAiRequest {
            model: model.to_owned(),
            messages: request.messages.iter().map(OpenAiMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
            response_format,
        }
    }

    /// Log message shapes for debugging; contents are never logged
    fn log_messages_debug(&self, request: &ChatRequest) {
        for (i, msg) in request.messages.iter().enumerate() {
            debug!(
                "Message[{i}] role={}, content_len={}, images={}",
                msg.role.as_str(),
                msg.content.len(),
                msg.images.len()
            );
        }
        debug!(
            "Sending chat completion request to {} with {} messages",
            self.config.provider_name,
            request.messages.len()
        );
    }

    /// Parse error response from API
    fn parse_error_response(status: reqwest::StatusCode, body: &str) -> AppError {
        let detail = serde_json::from_str::<OpenAiErrorResponse>(body)
            .map(|parsed| parsed.error.message().to_owned())
            .unwrap_or_else(|_| body.chars().take(200).collect());

        match status.as_u16() {
            401 | 403 => AppError::new(
                ErrorCode::ExternalAuthFailed,
                format!("{SERVICE_LABEL}: endpoint rejected credentials: {detail}"),
            ),
            429 => AppError::new(
                ErrorCode::ExternalRateLimited,
                format!("{SERVICE_LABEL}: rate limit reached: {detail}"),
            ),
            404 => AppError::external_service(
                SERVICE_LABEL,
                format!("Model or endpoint not found: {detail}"),
            ),
            502..=504 => AppError::external_unavailable(
                SERVICE_LABEL,
                format!("Model server is not responding ({status}): {detail}"),
            ),
            _ => AppError::external_service(SERVICE_LABEL, format!("API error ({status}): {detail}")),
        }
    }

    fn map_send_error(&self, e: &reqwest::Error) -> AppError {
        error!(
            "Failed to send request to {}: {}",
            self.config.provider_name, e
        );
        if e.is_timeout() {
            AppError::new(
                ErrorCode::ModelTimeout,
                format!("{} did not answer in time", self.label()),
            )
        } else if e.is_connect() {
            AppError::external_unavailable(
                SERVICE_LABEL,
                format!(
                    "Cannot connect to {}. Is the server running at {}?",
                    self.label(),
                    self.config.base_url
                ),
            )
        } else {
            AppError::external_service(SERVICE_LABEL, format!("Request failed: {e}"))
        }
    }

    /// Add authorization header if API key is configured
    fn add_auth_header(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref api_key) = self.config.api_key {
            request.bearer_auth(api_key)
        } else {
            request
        }
    }

    async fn send(&self, body: &OpenAiRequest) -> AppResult<reqwest::Response> {
        let http_request = self
            .client
            .post(self.api_url("chat/completions"))
            .json(body);

        self.add_auth_header(http_request)
            .send()
            .await
            .map_err(|e| self.map_send_error(&e))
    }
}

/// Convert one streamed JSON payload into a chunk
fn parse_stream_payload(json_str: &str) -> Option<AppResult<StreamChunk>> {
    match serde_json::from_str::<OpenAiStreamChunk>(json_str) {
        Ok(chunk) => {
            let choice = chunk.choices.into_iter().next()?;
            Some(Ok(StreamChunk {
                delta: choice.delta.content.unwrap_or_default(),
                is_final: choice.finish_reason.is_some(),
                finish_reason: choice.finish_reason,
            }))
        }
        Err(parse_error) => {
            if let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(json_str) {
                return Some(Err(AppError::external_service(
                    SERVICE_LABEL,
                    format!(
                        "Generation failed mid-stream: {}",
                        error_response.error.message()
                    ),
                )));
            }
            warn!("Failed to parse stream chunk: {}", parse_error);
            None
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.config.provider_name
    }

    fn capabilities(&self) -> LlmCapabilities {
        self.config.capabilities
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    #[instrument(skip(self, request), fields(model = %request.model.as_deref().unwrap_or(&self.config.default_model)))]
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        let started = Instant::now();
        self.log_messages_debug(request);

        let body = self.build_request(request, false);
        let result = async {
            let response = self.send(&body).await?;
            let status = response.status();
            let text = response.text().await.map_err(|e| {
                error!("Failed to read API response: {}", e);
                AppError::external_service(SERVICE_LABEL, format!("Failed to read response: {e}"))
            })?;

            if !status.is_success() {
                return Err(Self::parse_error_response(status, &text));
            }

            let openai_response: OpenAiResponse = serde_json::from_str(&text).map_err(|e| {
                error!("Failed to parse API response: {}", e);
                AppError::external_service(SERVICE_LABEL, format!("Failed to parse response: {e}"))
            })?;

            let choice = openai_response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| AppError::external_service(SERVICE_LABEL, "API returned no choices"))?;

            let content = choice.message.content.unwrap_or_default();
            debug!(
                "Received response from {}: {} chars, finish_reason: {:?}",
                self.config.provider_name,
                content.len(),
                choice.finish_reason
            );

            Ok(ChatResponse {
                content,
                model: if openai_response.model.is_empty() {
                    body.model.clone()
                } else {
                    openai_response.model
                },
                usage: openai_response.usage.map(|u| TokenUsage {
                    prompt_tokens: u.prompt,
                    completion_tokens: u.completion,
                    total_tokens: u.total,
                }),
                finish_reason: choice.finish_reason,
            })
        }
        .await;

        AppLogger::log_model_call(
            &self.config.provider_name,
            &body.model,
            result.is_ok(),
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        );
        result
    }

    #[instrument(skip(self, request), fields(model = %request.model.as_deref().unwrap_or(&self.config.default_model)))]
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        self.log_messages_debug(request);

        let body = self.build_request(request, true);
        let response = self.send(&body).await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::parse_error_response(status, &text));
        }

        Ok(create_sse_stream(
            response.bytes_stream(),
            parse_stream_payload,
            SERVICE_LABEL,
        ))
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<bool, AppError> {
        debug!(
            "Performing {} health check at {}",
            self.config.provider_name, self.config.base_url
        );

        let http_request = self.client.get(self.api_url("models"));
        let response = self
            .add_auth_header(http_request)
            .send()
            .await
            .map_err(|e| self.map_send_error(&e))?;

        let healthy = response.status().is_success();
        if !healthy {
            warn!(
                "{} health check failed with status: {}",
                self.config.provider_name,
                response.status()
            );
        }

        Ok(healthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_message_serializes_as_string() {
        let message = OpenAiMessage::from(&ChatMessage::user("hello"));
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value, json!({"role": "user", "content": "hello"}));
    }

    #[test]
    fn test_image_message_serializes_as_parts() {
        let message = OpenAiMessage::from(
            &ChatMessage::user("what is this?").with_image("data:image/png;base64,AAAA"),
        );
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": "what is this?"},
                    {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
                ]
            })
        );
    }

    #[test]
    fn test_parse_error_response_status_mapping() {
        let body = r#"{"error":{"message":"model 'nope' not found","type":"api_error"}}"#;
        let not_found =
            OpenAiCompatibleProvider::parse_error_response(reqwest::StatusCode::NOT_FOUND, body);
        assert_eq!(not_found.code, ErrorCode::ExternalServiceError);
        assert!(not_found.message.contains("model 'nope' not found"));

        let unavailable = OpenAiCompatibleProvider::parse_error_response(
            reqwest::StatusCode::BAD_GATEWAY,
            "<html>bad gateway</html>",
        );
        assert_eq!(unavailable.code, ErrorCode::ExternalServiceUnavailable);

        let limited = OpenAiCompatibleProvider::parse_error_response(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":"slow down"}"#,
        );
        assert_eq!(limited.code, ErrorCode::ExternalRateLimited);
        assert!(limited.message.contains("slow down"));
    }

    #[test]
    fn test_parse_stream_payload() {
        let chunk = parse_stream_payload(r#"{"choices":[{"delta":{"content":"Hi"},"finish_reason":null}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(chunk.delta, "Hi");
        assert!(!chunk.is_final);

        let error = parse_stream_payload(r#"{"error":{"message":"out of memory"}}"#)
            .unwrap()
            .unwrap_err();
        assert!(error.message.contains("out of memory"));

        assert!(parse_stream_payload("not json").is_none());
        assert!(parse_stream_payload(r#"{"choices":[]}"#).is_none());
    }
}
