// ABOUTME: Scripted model backend for deterministic orchestrator and route tests
// ABOUTME: Replays queued replies, chunk sequences, failures, or hangs and records every request
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use health_mentor_server::errors::AppError;
use health_mentor_server::llm::{
    ChatRequest, ChatResponse, ChatStream, LlmCapabilities, LlmProvider, StreamChunk,
};

/// Reply used when no script is queued
pub const DEFAULT_REPLY: &str = "Stay hydrated and keep moving.";

/// One scripted model behavior
#[derive(Debug, Clone)]
pub enum Script {
    /// Complete reply; streamed as a single chunk
    Reply(String),
    /// Streamed fragments; joined for complete calls
    Chunks(Vec<String>),
    /// Streamed fragments followed by a mid-stream failure
    ChunksThenFail(Vec<String>, String),
    /// The call itself fails
    Fail(String),
    /// Streamed fragments, then the backend stops responding
    Hang(Vec<String>),
}

/// Model backend that follows a queue of scripts
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ChatRequest>>,
    healthy: AtomicBool,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProvider {
    /// Provider that answers [`DEFAULT_REPLY`] until scripts are queued
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            healthy: AtomicBool::new(true),
        }
    }

    /// Provider with a queue of scripts
    pub fn with_scripts(scripts: impl IntoIterator<Item = Script>) -> Self {
        let provider = Self::new();
        provider.scripts.lock().unwrap().extend(scripts);
        provider
    }

    /// Queue one more script
    #[allow(dead_code)]
    pub fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    /// Set the health check result
    #[allow(dead_code)]
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Every request received, in order
    #[allow(dead_code)]
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// The most recent request
    #[allow(dead_code)]
    pub fn last_request(&self) -> ChatRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request recorded")
    }

    fn next_script(&self, request: &ChatRequest) -> Script {
        self.requests.lock().unwrap().push(request.clone());
        self.scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Script::Reply(DEFAULT_REPLY.to_owned()))
    }
}

fn chunk(delta: String) -> Result<StreamChunk, AppError> {
    Ok(StreamChunk {
        delta,
        is_final: false,
        finish_reason: None,
    })
}

fn final_chunk() -> Result<StreamChunk, AppError> {
    Ok(StreamChunk {
        delta: String::new(),
        is_final: true,
        finish_reason: Some("stop".to_owned()),
    })
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::STREAMING | LlmCapabilities::VISION | LlmCapabilities::JSON_MODE
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        let content = match self.next_script(request) {
            Script::Reply(text) => text,
            Script::Chunks(parts) => parts.concat(),
            Script::ChunksThenFail(_, message) | Script::Fail(message) => {
                return Err(AppError::external_service("LLM", message))
            }
            Script::Hang(_) => std::future::pending().await,
        };
        Ok(ChatResponse {
            content,
            model: request.model.clone().unwrap_or_default(),
            usage: None,
            finish_reason: Some("stop".to_owned()),
        })
    }

    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        match self.next_script(request) {
            Script::Reply(text) => Ok(Box::pin(stream::iter(vec![chunk(text), final_chunk()]))),
            Script::Chunks(parts) => {
                let mut items: Vec<_> = parts.into_iter().map(chunk).collect();
                items.push(final_chunk());
                Ok(Box::pin(stream::iter(items)))
            }
            Script::ChunksThenFail(parts, message) => {
                let mut items: Vec<_> = parts.into_iter().map(chunk).collect();
                items.push(Err(AppError::external_service("LLM", message)));
                Ok(Box::pin(stream::iter(items)))
            }
            Script::Fail(message) => Err(AppError::external_unavailable("LLM", message)),
            Script::Hang(parts) => {
                let items: Vec<_> = parts.into_iter().map(chunk).collect();
                Ok(Box::pin(stream::iter(items).chain(stream::pending())))
            }
        }
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        Ok(self.healthy.load(Ordering::SeqCst))
    }
}
