// ABOUTME: Model backend contract shared by the mentor chat and the food analyzer
// ABOUTME: Message, request and stream types plus the async provider trait
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Model Backend
//!
//! Chat turns and food image analysis both talk to a model through
//! [`LlmProvider`]. The only production backend is the OpenAI-compatible
//! client, which covers a local Ollama daemon and hosted endpoints alike.
//!
//! A mentor turn is sent as one message list: the composed system prompt, the
//! stored history, then the new user message.
//!
//! ```rust,no_run
//! use health_mentor_server::llm::{ChatMessage, ChatRequest, LlmProvider};
//!
//! async fn example(provider: &dyn LlmProvider) {
//!     let history = vec![
//!         ChatMessage::user("I walked 8k steps today"),
//!         ChatMessage::assistant("Nice work! How did your knees feel?"),
//!     ];
//!     let request = ChatRequest::turn("You are a health mentor.", history, "A bit sore.");
//!     let reply = provider.complete(&request).await;
//! }
//! ```

mod openai_compatible;
pub mod prompts;
pub mod sse_parser;

pub use openai_compatible::{OpenAiCompatibleConfig, OpenAiCompatibleProvider};

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

bitflags::bitflags! {
    /// Features a model backend offers
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct LlmCapabilities: u8 {
        /// Incremental replies over SSE
        const STREAMING = 1 << 0;
        /// `system` role messages
        const SYSTEM_MESSAGES = 1 << 1;
        /// Image parts on user messages
        const VISION = 1 << 2;
        /// `response_format: json_object`
        const JSON_MODE = 1 << 3;
    }
}

impl LlmCapabilities {
    /// What an Ollama daemon with a multimodal model supports
    #[must_use]
    pub const fn ollama() -> Self {
        Self::all()
    }
}

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Composed system prompt
    System,
    /// End user
    User,
    /// Model reply
    Assistant,
}

impl MessageRole {
    /// Wire name of the role
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role-tagged message
///
/// Stored history serializes as `{"role", "content"}`; `images` only appears
/// on food analysis requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author
    pub role: MessageRole,
    /// Text
    pub content: String,
    /// Images as `data:` URLs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl ChatMessage {
    /// Message with no images
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            images: Vec::new(),
        }
    }

    /// System prompt message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// User message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Attach an image given as a `data:` URL
    #[must_use]
    pub fn with_image(mut self, data_url: impl Into<String>) -> Self {
        self.images.push(data_url.into());
        self
    }
}

/// A completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Messages in order
    pub messages: Vec<ChatMessage>,
    /// Model override; the provider default applies when `None`
    pub model: Option<String>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Completion token limit
    pub max_tokens: Option<u32>,
    /// Stream the reply
    pub stream: bool,
    /// Ask for a single JSON object reply
    pub json_mode: bool,
}

impl ChatRequest {
    /// Request over an explicit message list
    #[must_use]
    pub const fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
            temperature: None,
            max_tokens: None,
            stream: false,
            json_mode: false,
        }
    }

    /// Request for one mentor turn: system prompt, prior history, new message
    #[must_use]
    pub fn turn(
        system_prompt: impl Into<String>,
        history: Vec<ChatMessage>,
        user_message: impl Into<String>,
    ) -> Self {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system_prompt));
        messages.extend(history);
        messages.push(ChatMessage::user(user_message));
        Self::new(messages)
    }

    /// Use `model`
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set or clear the temperature
    #[must_use]
    pub const fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set or clear the token limit
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Mark the request as streaming
    #[must_use]
    pub const fn with_streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    /// Ask for JSON-only output
    #[must_use]
    pub const fn with_json_mode(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// A complete reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Reply text
    pub content: String,
    /// Model that answered
    pub model: String,
    /// Token accounting, when the backend reports it
    pub usage: Option<TokenUsage>,
    /// Why generation stopped
    pub finish_reason: Option<String>,
}

/// Token accounting for one call
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub prompt_tokens: u32,
    /// Generated tokens
    pub completion_tokens: u32,
    /// Sum of both
    pub total_tokens: u32,
}

/// One fragment of a streamed reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Text appended by this fragment, possibly empty
    pub delta: String,
    /// Last fragment of the reply
    pub is_final: bool,
    /// Why generation stopped, on the last fragment
    pub finish_reason: Option<String>,
}

/// Streamed reply
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, AppError>> + Send>>;

/// A model backend
///
/// A stream returned by [`LlmProvider::complete_stream`] is finite and not
/// restartable; polling it is what drives generation on the backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short identifier used in logs (e.g. `ollama`)
    fn name(&self) -> &str;

    /// Supported features
    fn capabilities(&self) -> LlmCapabilities;

    /// Model used when a request names none
    fn default_model(&self) -> &str;

    /// Generate a complete reply
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError>;

    /// Generate a reply as a stream of fragments
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError>;

    /// Whether the backend answers at all
    async fn health_check(&self) -> Result<bool, AppError>;
}
