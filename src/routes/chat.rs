// ABOUTME: Chat route handlers for the personalized health mentor
// ABOUTME: Complete and SSE-streamed turns plus conversation history lookup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Chat routes
//!
//! - `POST /chat`: run a turn, reply `{response, conversation_id}`
//! - `POST /chat/stream`: run a turn as `text/event-stream`, one
//!   `data: {json}` frame per [`ChatStreamEvent`]
//! - `GET /chat/conversations/:conversation_id`: stored messages
//!
//! When identity verification is enabled the `user_id` in the body must be the
//! verified token subject. Conversations belong to the user who started them;
//! history lookups and continuations by anyone else answer 404. Without
//! verification the history route takes the caller from `?user_id=`.


use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use futures_util::stream::{Stream, StreamExt};
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{with_request_id, JsonBody};
use crate::auth::VerifiedIdentity;
use crate::constants::routes;
use crate::errors::AppError;
use crate::llm::ChatMessage;
use crate::mentor::{ChatStreamEvent, ChatTurnRequest, ChatTurnResponse};
use crate::resources::ServerResources;

/// Stored history of one conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationResponse {
    /// Conversation identifier
    pub conversation_id: String,
    /// Messages in append order
    pub messages: Vec<ChatMessage>,
}

/// Query parameters of the history route
#[derive(Debug, Default, Deserialize)]
pub struct ConversationQuery {
    /// Caller id; required when no verified identity is present
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Chat routes handler
pub struct ChatRoutes;

impl ChatRoutes {
    /// Create all chat routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(routes::CHAT, post(Self::chat))
            .route(routes::CHAT_STREAM, post(Self::chat_stream))
            .route(routes::CONVERSATION, get(Self::get_conversation))
            .with_state(resources)
    }

    /// Reject requests whose `user_id` differs from the verified token subject
    fn check_subject(identity: Option<&VerifiedIdentity>, user_id: &str) -> Result<(), AppError> {
        match identity {
            Some(identity) if identity.subject_id != user_id => {
                warn!(
                    subject = %identity.subject_id,
                    user_id = %user_id,
                    "chat request for another user"
                );
                Err(AppError::auth_invalid("Token subject does not match user_id"))
            }
            _ => Ok(()),
        }
    }

    /// Caller of the history route: the token subject, else `?user_id=`
    fn history_caller(
        identity: Option<&VerifiedIdentity>,
        query: ConversationQuery,
    ) -> Result<String, AppError> {
        let requested = query.user_id.filter(|id| !id.trim().is_empty());
        match (identity, requested) {
            (Some(identity), Some(user_id)) => {
                Self::check_subject(Some(identity), &user_id)?;
                Ok(user_id)
            }
            (Some(identity), None) => Ok(identity.subject_id.clone()),
            (None, Some(user_id)) => Ok(user_id),
            (None, None) => Err(AppError::missing_field("user_id")),
        }
    }

    /// Run a turn and return the complete reply
    async fn chat(
        State(resources): State<Arc<ServerResources>>,
        identity: Option<Extension<VerifiedIdentity>>,
        headers: HeaderMap,
        JsonBody(request): JsonBody<ChatTurnRequest>,
    ) -> Result<Json<ChatTurnResponse>, AppError> {
        Self::check_subject(identity.as_ref().map(|Extension(id)| id), &request.user_id)
            .map_err(|e| with_request_id(e, &headers))?;

        resources
            .orchestrator
            .handle_turn(request)
            .await
            .map(Json)
            .map_err(|e| with_request_id(e, &headers))
    }

    /// Run a turn and stream the reply via SSE
    async fn chat_stream(
        State(resources): State<Arc<ServerResources>>,
        identity: Option<Extension<VerifiedIdentity>>,
        headers: HeaderMap,
        JsonBody(request): JsonBody<ChatTurnRequest>,
    ) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
        Self::check_subject(identity.as_ref().map(|Extension(id)| id), &request.user_id)
            .map_err(|e| with_request_id(e, &headers))?;

        let events = resources
            .orchestrator
            .handle_turn_stream(request)
            .await
            .map_err(|e| with_request_id(e, &headers))?;

        let stream = events.map(|event| Ok(sse_frame(&event)));
        Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
    }

    /// Stored messages of a conversation owned by the caller
    async fn get_conversation(
        State(resources): State<Arc<ServerResources>>,
        identity: Option<Extension<VerifiedIdentity>>,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
        Query(query): Query<ConversationQuery>,
    ) -> Result<Json<ConversationResponse>, AppError> {
        let caller = Self::history_caller(identity.as_ref().map(|Extension(id)| id), query)
            .map_err(|e| with_request_id(e, &headers))?;

        let messages = resources
            .orchestrator
            .conversation_history(&conversation_id, &caller)
            .await
            .map_err(|e| with_request_id(e, &headers))?;

        info!(
            conversation_id = %conversation_id,
            message_count = messages.len(),
            "conversation history served"
        );
        Ok(Json(ConversationResponse {
            conversation_id,
            messages,
        }))
    }
}

/// One SSE `data:` frame for an event
fn sse_frame(event: &ChatStreamEvent) -> Event {
    Event::default().json_data(event).unwrap_or_else(|e| {
        warn!(error = %e, "failed to serialize stream event");
        Event::default().data(r#"{"type":"error","error":"Failed to serialize event"}"#)
    })
}
