// ABOUTME: Food image analysis with a vision model returning structured nutrition facts
// ABOUTME: Sends the image as a data URL and parses the model's JSON-only reply
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Food Analyzer
//!
//! The vision model is instructed to answer with one JSON object:
//!
//! ```json
//! {"status": "success", "food_detected": true,
//!  "nutrition_facts": {"calories": 520, "total_fat": "18g", "protein": "32g", "carbs": "55g"},
//!  "notes": "..."}
//! ```
//!
//! or `{"status": "error", "food_detected": false, "message": "..."}` when the
//! image shows no food. A reply that is not JSON fails with
//! `ModelInvocationFailed` carrying the raw text.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::config::LlmConfig;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::llm::prompts::NUTRITION_ANALYSIS_PROMPT;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};

/// Longest raw reply echoed back in an error message
const MAX_RAW_REPLY_CHARS: usize = 2000;

/// Analyzes food photos with a vision-capable model
pub struct FoodAnalyzer {
    provider: Arc<dyn LlmProvider>,
    model: String,
    timeout: Duration,
}

impl FoodAnalyzer {
    /// Create an analyzer using `model` on `provider`
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            provider,
            model: model.into(),
            timeout,
        }
    }

    /// Analyzer configured from the model settings
    #[must_use]
    pub fn from_llm_config(provider: Arc<dyn LlmProvider>, config: &LlmConfig) -> Self {
        Self::new(provider, config.vision_model.clone(), config.model_timeout())
    }

    /// Estimate nutrition facts for the food in an image
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty image or a non-image content type
    /// - `ModelTimeout` when the model exceeds its deadline
    /// - `ModelInvocationFailed` when the call fails or the reply is not JSON
    #[instrument(skip(self, image), fields(bytes = image.len(), model = %self.model))]
    pub async fn analyze(&self, image: &[u8], content_type: &str) -> AppResult<Value> {
        if image.is_empty() {
            return Err(AppError::invalid_input("Uploaded image is empty"));
        }
        if !content_type.starts_with("image/") {
            return Err(AppError::invalid_input(format!(
                "Unsupported content type '{content_type}': an image is required"
            )));
        }

        let data_url = format!("data:{content_type};base64,{}", STANDARD.encode(image));
        let request = ChatRequest::new(vec![
            ChatMessage::user(NUTRITION_ANALYSIS_PROMPT).with_image(data_url)
        ])
        .with_model(self.model.clone())
        .with_json_mode();

        let response = match timeout(self.timeout, self.provider.complete(&request)).await {
            Err(_) => return Err(AppError::model_timeout(self.timeout.as_secs())),
            Ok(Err(e)) if e.code == ErrorCode::ModelTimeout => return Err(e),
            Ok(Err(e)) => {
                return Err(AppError::model_invocation(format!(
                    "Image analysis failed: {}",
                    e.message
                )))
            }
            Ok(Ok(response)) => response,
        };

        debug!(reply_len = response.content.len(), "vision model replied");
        parse_analysis(&response.content)
    }
}

/// Parse the model reply, tolerating a Markdown code fence around the JSON
///
/// # Errors
///
/// Returns `ModelInvocationFailed` with the raw reply when it is not a JSON object.
pub fn parse_analysis(reply: &str) -> AppResult<Value> {
    let body = strip_code_fence(reply);
    match serde_json::from_str::<Value>(body) {
        Ok(value) if value.is_object() => Ok(value),
        Ok(_) | Err(_) => {
            warn!("vision model returned a non-JSON reply");
            let raw: String = reply.chars().take(MAX_RAW_REPLY_CHARS).collect();
            Err(AppError::model_invocation(format!(
                "Invalid JSON response from model: {raw}"
            )))
        }
    }
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
