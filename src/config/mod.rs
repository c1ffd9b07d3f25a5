// ABOUTME: Configuration management module for centralized server settings
// ABOUTME: Environment-only configuration for the listener, model endpoint, and Firebase
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration module for the health mentor server
//!
//! All settings come from environment variables; see [`ServerConfig::from_env`].

/// Environment and server configuration
pub mod environment;

pub use environment::{
    DocumentStoreBackend, DocumentStoreConfig, Environment, FirebaseConfig, LlmConfig,
    ServerConfig,
};
