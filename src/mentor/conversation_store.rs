// ABOUTME: Conversation store holding per-conversation chat history with per-identifier turn locks
// ABOUTME: In-memory DashMap implementation; entries are owned by their creating user and never evicted
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Conversation Store
//!
//! Owns every conversation history. The session orchestrator is its only
//! writer and holds the conversation's turn lock from the history snapshot
//! until both turn messages are appended, so turns on one identifier are
//! serialized while different identifiers proceed concurrently.
//!
//! Every conversation belongs to the user that created it. Lookups by any
//! other user behave exactly like lookups of an unknown identifier, so the
//! existence of someone else's conversation is never revealed.
//!
//! Known limitations: nothing is evicted, so memory grows with the number of
//! distinct identifiers, and history does not survive a restart.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::llm::{ChatMessage, MessageRole};

/// Access to one conversation, returned by [`ConversationStore::get_or_create`]
#[derive(Debug, Clone)]
pub struct ConversationHandle {
    conversation_id: String,
    turn_lock: Arc<Mutex<()>>,
}

impl ConversationHandle {
    /// Create a handle around an existing turn lock
    #[must_use]
    pub fn new(conversation_id: impl Into<String>, turn_lock: Arc<Mutex<()>>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            turn_lock,
        }
    }

    /// Conversation identifier
    #[must_use]
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Wait until no other turn is running on this conversation
    ///
    /// The returned guard is owned so it can travel into a response stream.
    pub async fn begin_turn(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.turn_lock).lock_owned().await
    }
}

/// Storage for conversation histories
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Return the conversation, creating an empty one owned by `owner` for an
    /// unseen identifier
    ///
    /// # Errors
    ///
    /// Fails with `ResourceNotFound` when the identifier belongs to another user.
    async fn get_or_create(&self, conversation_id: &str, owner: &str)
        -> AppResult<ConversationHandle>;

    /// Append one message to an existing conversation
    ///
    /// # Errors
    ///
    /// Fails with `ResourceNotFound` for an unknown identifier and
    /// `InvalidInput` for system messages, which are never stored.
    async fn append(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: String,
    ) -> AppResult<()>;

    /// Append a completed turn: the user message, then the assistant reply
    ///
    /// # Errors
    ///
    /// See [`ConversationStore::append`].
    async fn append_turn(
        &self,
        conversation_id: &str,
        user_message: String,
        assistant_reply: String,
    ) -> AppResult<()> {
        self.append(conversation_id, MessageRole::User, user_message)
            .await?;
        self.append(conversation_id, MessageRole::Assistant, assistant_reply)
            .await
    }

    /// Copy of the history, or `None` for an unknown identifier or one owned
    /// by a different user
    async fn history(&self, conversation_id: &str, owner: &str) -> Option<Vec<ChatMessage>>;

    /// Number of conversations held
    async fn conversation_count(&self) -> usize;
}

#[derive(Debug)]
struct ConversationEntry {
    owner: String,
    turn_lock: Arc<Mutex<()>>,
    messages: RwLock<Vec<ChatMessage>>,
}

impl ConversationEntry {
    fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_owned(),
            turn_lock: Arc::default(),
            messages: RwLock::default(),
        }
    }
}

/// Process-local conversation store
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    conversations: DashMap<String, Arc<ConversationEntry>>,
}

impl InMemoryConversationStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, conversation_id: &str) -> AppResult<Arc<ConversationEntry>> {
        self.conversations
            .get(conversation_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| AppError::not_found(format!("Conversation '{conversation_id}'")))
    }
}

fn reject_system_role(role: MessageRole) -> AppResult<()> {
    if role == MessageRole::System {
        return Err(AppError::invalid_input(
            "System messages are not stored in conversation history",
        ));
    }
    Ok(())
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get_or_create(
        &self,
        conversation_id: &str,
        owner: &str,
    ) -> AppResult<ConversationHandle> {
        let entry = Arc::clone(
            self.conversations
                .entry(conversation_id.to_owned())
                .or_insert_with(|| {
                    debug!(conversation_id = %conversation_id, "creating conversation");
                    Arc::new(ConversationEntry::new(owner))
                })
                .value(),
        );
        if entry.owner != owner {
            debug!(conversation_id = %conversation_id, "conversation owned by another user");
            return Err(AppError::not_found(format!("Conversation '{conversation_id}'")));
        }
        Ok(ConversationHandle::new(
            conversation_id,
            Arc::clone(&entry.turn_lock),
        ))
    }

    async fn append(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: String,
    ) -> AppResult<()> {
        reject_system_role(role)?;
        let entry = self.entry(conversation_id)?;
        entry
            .messages
            .write()
            .await
            .push(ChatMessage::new(role, content));
        Ok(())
    }

    async fn append_turn(
        &self,
        conversation_id: &str,
        user_message: String,
        assistant_reply: String,
    ) -> AppResult<()> {
        let entry = self.entry(conversation_id)?;
        let mut messages = entry.messages.write().await;
        messages.push(ChatMessage::user(user_message));
        messages.push(ChatMessage::assistant(assistant_reply));
        Ok(())
    }

    async fn history(&self, conversation_id: &str, owner: &str) -> Option<Vec<ChatMessage>> {
        let entry = self
            .entry(conversation_id)
            .ok()
            .filter(|entry| entry.owner == owner)?;
        let messages = entry.messages.read().await;
        Some(messages.clone())
    }

    async fn conversation_count(&self) -> usize {
        self.conversations.len()
    }
}
