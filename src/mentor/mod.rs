// ABOUTME: Health mentor chat core: profile loading, prompt composition, history, and turn orchestration
// ABOUTME: Wires the document store and model backend into personalized chat turns
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Mentor Chat Core
//!
//! Control flow of a turn:
//!
//! ```text
//! client message -> ProfileLoader -> PromptComposer -> SessionOrchestrator
//!                                   (ConversationStore lookup, model call, history append)
//!                -> complete reply or event stream
//! ```
//!
//! The conversation store exclusively owns histories and the orchestrator is
//! its only writer. Loaded profiles are read-only input to the composer and
//! are not retained between turns, so profile edits apply from the next turn.

mod conversation_store;
mod profile_loader;
mod prompt;
mod session;

pub use conversation_store::{ConversationHandle, ConversationStore, InMemoryConversationStore};
pub use profile_loader::ProfileLoader;
pub use prompt::{PromptComposer, SafetyDirectiveMode};
pub use session::{
    ChatEventStream, ChatStreamEvent, ChatTurnRequest, ChatTurnResponse, ModelSettings,
    SessionOrchestrator,
};
