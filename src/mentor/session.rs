// ABOUTME: Session orchestrator running one chat turn in complete or streamed mode
// ABOUTME: Loads the profile, composes the prompt, calls the model under a deadline, and appends history
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Session Orchestrator
//!
//! Both modes run the same steps:
//!
//! 1. load the profile (a missing base record fails the turn before any
//!    conversation is created)
//! 2. resolve the conversation id, generating a UUID when none is supplied;
//!    a supplied id is used verbatim and only an empty string counts as absent
//! 3. get or create the conversation and take its turn lock; an id that
//!    belongs to another user fails as not found
//! 4. compose the system prompt from the freshly loaded profile
//! 5. call the model with system prompt, prior history and the new message
//! 6. on success append the user message and the full reply
//!
//! Streamed turns emit one `start` event, zero or more `chunk` events and
//! exactly one terminal `end` or `error` event. Chunks already sent are never
//! retracted. A turn that fails or is abandoned leaves history untouched.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{ConversationStore, ProfileLoader, PromptComposer};
use crate::config::LlmConfig;
use crate::constants::defaults;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};
use crate::logging::AppLogger;

/// One chat turn as submitted by a client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurnRequest {
    /// User message text
    pub message: String,
    /// Identifier of the user whose profile personalizes the prompt
    pub user_id: String,
    /// Conversation to continue; a new one is started when absent
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Reply to a complete (non-streamed) turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurnResponse {
    /// Full assistant reply
    pub response: String,
    /// Conversation the turn was appended to
    pub conversation_id: String,
}

/// Event of a streamed turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatStreamEvent {
    /// First event, before any model output
    Start {
        /// Resolved conversation id
        conversation_id: String,
    },
    /// Next fragment of the reply
    Chunk {
        /// Text fragment
        content: String,
    },
    /// The reply completed and was stored
    End,
    /// The turn failed; no further events follow
    Error {
        /// Failure description
        error: String,
    },
}

impl ChatStreamEvent {
    /// Whether this event ends the stream
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::End | Self::Error { .. })
    }
}

/// Stream of events for one streamed turn
pub type ChatEventStream = Pin<Box<dyn Stream<Item = ChatStreamEvent> + Send>>;

/// Model parameters applied to every turn
#[derive(Debug, Clone)]
pub struct ModelSettings {
    /// Chat model identifier
    pub model: String,
    /// Optional sampling temperature
    pub temperature: Option<f32>,
    /// Optional completion length cap
    pub max_tokens: Option<u32>,
    /// Upper bound for one model call, including a whole streamed reply
    pub timeout: Duration,
}

impl ModelSettings {
    /// Chat settings from the model configuration
    #[must_use]
    pub fn from_llm_config(config: &LlmConfig) -> Self {
        Self {
            model: config.chat_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.model_timeout(),
        }
    }
}

/// A turn that holds its conversation lock and is ready for the model
struct PreparedTurn {
    conversation_id: String,
    request: ChatRequest,
    guard: OwnedMutexGuard<()>,
}

/// Runs chat turns
pub struct SessionOrchestrator {
    profiles: ProfileLoader,
    composer: PromptComposer,
    conversations: Arc<dyn ConversationStore>,
    provider: Arc<dyn LlmProvider>,
    settings: ModelSettings,
}

impl SessionOrchestrator {
    /// Wire an orchestrator from its collaborators
    #[must_use]
    pub fn new(
        profiles: ProfileLoader,
        composer: PromptComposer,
        conversations: Arc<dyn ConversationStore>,
        provider: Arc<dyn LlmProvider>,
        settings: ModelSettings,
    ) -> Self {
        Self {
            profiles,
            composer,
            conversations,
            provider,
            settings,
        }
    }

    /// Conversation store backing this orchestrator
    #[must_use]
    pub fn conversations(&self) -> &Arc<dyn ConversationStore> {
        &self.conversations
    }

    /// Model backend used for turns
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Stored messages of a conversation owned by `user_id`
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown conversation id or one that
    /// belongs to a different user.
    pub async fn conversation_history(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> AppResult<Vec<ChatMessage>> {
        self.conversations
            .history(conversation_id, user_id)
            .await
            .ok_or_else(|| AppError::not_found(format!("Conversation '{conversation_id}'")))
    }

    /// Run a turn and return the complete reply
    ///
    /// # Errors
    ///
    /// - `MissingRequiredField` for a blank message or user id
    /// - `ResourceNotFound` when the user has no base record or the
    ///   conversation belongs to another user
    /// - `ModelInvocationFailed` or `ModelTimeout` when the model fails
    #[instrument(skip_all, fields(user_id = %request.user_id))]
    pub async fn handle_turn(&self, request: ChatTurnRequest) -> AppResult<ChatTurnResponse> {
        let started = std::time::Instant::now();
        validate(&request)?;

        let prepared = self.prepare(&request).await?;
        let conversation_id = prepared.conversation_id.clone();

        let result = match timeout(self.settings.timeout, self.provider.complete(&prepared.request)).await {
            Err(_) => Err(AppError::model_timeout(self.settings.timeout.as_secs())),
            Ok(Err(e)) => Err(model_failure(e)),
            Ok(Ok(response)) => Ok(response.content),
        };

        let outcome = match result {
            Ok(reply) => self
                .conversations
                .append_turn(&conversation_id, request.message, reply.clone())
                .await
                .map(|()| ChatTurnResponse {
                    response: reply,
                    conversation_id: conversation_id.clone(),
                }),
            Err(e) => Err(e),
        };
        drop(prepared.guard);

        if let Err(e) = &outcome {
            warn!(conversation_id = %conversation_id, error = %e, "chat turn failed");
        }
        AppLogger::log_chat_turn(
            &request.user_id,
            &conversation_id,
            false,
            outcome.is_ok(),
            elapsed_ms(started),
        );
        outcome
    }

    /// Run a turn and stream the reply as events
    ///
    /// Validation and profile failures are returned as errors before any
    /// event is produced; everything after `start` is reported in-stream.
    ///
    /// # Errors
    ///
    /// - `MissingRequiredField` for a blank message or user id
    /// - `ResourceNotFound` when the user has no base record or the
    ///   conversation belongs to another user
    #[instrument(skip_all, fields(user_id = %request.user_id))]
    pub async fn handle_turn_stream(&self, request: ChatTurnRequest) -> AppResult<ChatEventStream> {
        let started = std::time::Instant::now();
        validate(&request)?;

        let PreparedTurn {
            conversation_id,
            request: chat_request,
            guard,
        } = self.prepare(&request).await?;

        let chat_request = chat_request.with_streaming();
        let deadline = stream_deadline(Instant::now(), self.settings.timeout);
        let timeout_secs = self.settings.timeout.as_secs();
        let provider = Arc::clone(&self.provider);
        let conversations = Arc::clone(&self.conversations);
        let ChatTurnRequest {
            message, user_id, ..
        } = request;

        let stream = async_stream::stream! {
            let _guard = guard;
            yield ChatStreamEvent::Start { conversation_id: conversation_id.clone() };

            let mut reply = String::new();
            let mut failure: Option<AppError> = None;

            match timeout_at(deadline, provider.complete_stream(&chat_request)).await {
                Err(_) => failure = Some(AppError::model_timeout(timeout_secs)),
                Ok(Err(e)) => failure = Some(model_failure(e)),
                Ok(Ok(mut chunks)) => loop {
                    match timeout_at(deadline, chunks.next()).await {
                        Err(_) => {
                            failure = Some(AppError::model_timeout(timeout_secs));
                            break;
                        }
                        Ok(None) => break,
                        Ok(Some(Err(e))) => {
                            failure = Some(model_failure(e));
                            break;
                        }
                        Ok(Some(Ok(chunk))) => {
                            if !chunk.delta.is_empty() {
                                reply.push_str(&chunk.delta);
                                yield ChatStreamEvent::Chunk { content: chunk.delta };
                            }
                            if chunk.is_final {
                                break;
                            }
                        }
                    }
                },
            }

            if failure.is_none() {
                if let Err(e) = conversations.append_turn(&conversation_id, message, reply).await {
                    failure = Some(e);
                }
            }

            let success = failure.is_none();
            match failure {
                None => {
                    yield ChatStreamEvent::End;
                }
                Some(e) => {
                    warn!(conversation_id = %conversation_id, error = %e, "streamed chat turn failed");
                    yield ChatStreamEvent::Error { error: e.message };
                }
            }
            AppLogger::log_chat_turn(&user_id, &conversation_id, true, success, elapsed_ms(started));
        };

        Ok(Box::pin(stream))
    }

    async fn prepare(&self, request: &ChatTurnRequest) -> AppResult<PreparedTurn> {
        let profile = self.profiles.load(&request.user_id).await.map_err(|e| {
            if e.is_not_found() {
                info!(user_id = %request.user_id, "user profile not found");
                AppError::not_found("User profile")
            } else {
                AppError::from(e)
            }
        })?;

        let conversation_id = request
            .conversation_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map_or_else(|| Uuid::new_v4().to_string(), str::to_owned);

        let handle = self
            .conversations
            .get_or_create(&conversation_id, &request.user_id)
            .await?;
        let guard = handle.begin_turn().await;
        let history = self
            .conversations
            .history(&conversation_id, &request.user_id)
            .await
            .unwrap_or_default();

        let system_prompt = self.composer.compose(&profile);
        debug!(
            conversation_id = %conversation_id,
            history_len = history.len(),
            prompt_len = system_prompt.len(),
            "prepared chat turn"
        );

        let chat_request = ChatRequest::turn(system_prompt, history, request.message.clone())
            .with_model(self.settings.model.clone())
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens);

        Ok(PreparedTurn {
            conversation_id,
            request: chat_request,
            guard,
        })
    }
}

fn validate(request: &ChatTurnRequest) -> AppResult<()> {
    if request.message.trim().is_empty() {
        return Err(AppError::missing_field("message"));
    }
    if request.user_id.trim().is_empty() {
        return Err(AppError::missing_field("user_id"));
    }
    Ok(())
}

/// Model errors surface as invocation failures; timeouts keep their code
fn model_failure(error: AppError) -> AppError {
    if error.code == ErrorCode::ModelTimeout {
        error
    } else {
        AppError::model_invocation(format!("Model invocation failed: {}", error.message))
    }
}

/// Deadline for a whole streamed reply, clamped to the configured maximum
fn stream_deadline(now: Instant, limit: Duration) -> Instant {
    let max = Duration::from_secs(defaults::MAX_MODEL_TIMEOUT_SECS);
    now.checked_add(limit)
        .unwrap_or_else(|| now + limit.min(max))
}

fn elapsed_ms(started: std::time::Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
