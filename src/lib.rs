// ABOUTME: Main library entry point for the health mentor backend
// ABOUTME: Personalized LLM chat sessions and food image analysis for a mobile fitness app
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![recursion_limit = "256"]
#![deny(unsafe_code)]

//! # Health Mentor Server
//!
//! Backend-for-frontend for a fitness app. Each chat turn loads the user's
//! health profile, composes a personalized system prompt, replays the
//! conversation history, and calls an OpenAI-compatible model endpoint
//! (Ollama by default), replying either in one piece or as server-sent events.
//!
//! ## Architecture
//!
//! - **`documents`**: user and profile records (in-memory or Firestore)
//! - **`mentor`**: profile loading, prompt composition, conversation history,
//!   and turn orchestration
//! - **`llm`**: model backend contract and the OpenAI-compatible client
//! - **`nutrition`**: food photo analysis with a vision model
//! - **`routes`** / **`server`**: the HTTP surface
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use health_mentor_server::config::ServerConfig;
//! use health_mentor_server::resources::ServerResources;
//! use health_mentor_server::server::MentorServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     let (host, port) = (config.host.clone(), config.http_port);
//!     let resources = Arc::new(ServerResources::from_config(config)?);
//!     MentorServer::new(resources).run(&host, port).await?;
//!     Ok(())
//! }
//! ```

/// Firebase ID token verification and account bookkeeping
pub mod auth;

/// Environment-based configuration
pub mod config;

/// Service constants, defaults, and route paths
pub mod constants;

/// Document store backends for user records
pub mod documents;

/// Application error types
pub mod errors;

/// Model backend abstraction and clients
pub mod llm;

/// Structured logging setup and domain log helpers
pub mod logging;

/// Mentor chat core
pub mod mentor;

/// HTTP middleware (identity, CORS, request tracing)
pub mod middleware;

/// Food image analysis
pub mod nutrition;

/// Shared server resources
pub mod resources;

/// HTTP route handlers
pub mod routes;

/// HTTP server assembly
pub mod server;
