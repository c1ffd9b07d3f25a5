// ABOUTME: Document store abstraction for user and profile records
// ABOUTME: Defines the get/merge contract shared by the in-memory and Firestore backends
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Document Store
//!
//! User records live in a key/value document store addressed by a collection
//! path and a key. Collection paths may be nested, e.g. the profile document
//! of a user lives at `users/{id}/profile` under key `data`.
//!
//! Backends:
//! - [`InMemoryDocumentStore`]: process-local, optionally seeded from a JSON file
//! - [`FirestoreDocumentStore`]: Firestore REST v1

mod credentials;
mod firestore;
mod memory;

pub use credentials::{FirestoreCredentials, ServiceAccountKey, ServiceAccountTokenSource};
pub use firestore::{decode_fields, encode_fields, FirestoreDocumentStore};
pub use memory::InMemoryDocumentStore;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{DocumentStoreBackend, ServerConfig};
use crate::errors::{AppError, AppResult, DocumentError};
use health_mentor_core::models::Record;

/// Key/value document access used by the profile loader
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name for logs and errors
    fn backend_name(&self) -> &'static str;

    /// Fetch one document; `Ok(None)` when it does not exist
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Record>, DocumentError>;

    /// Create the document or overwrite the given top-level fields of it
    async fn merge(&self, collection: &str, key: &str, fields: Record)
        -> Result<(), DocumentError>;
}

/// Build the document store selected by configuration
///
/// # Errors
///
/// Returns an error if the seed file or Firestore credentials cannot be loaded.
pub fn from_config(config: &ServerConfig) -> AppResult<Arc<dyn DocumentStore>> {
    match config.documents.backend {
        DocumentStoreBackend::Memory => {
            let store = match &config.documents.seed_path {
                Some(path) => InMemoryDocumentStore::from_seed_file(path)?,
                None => InMemoryDocumentStore::new(),
            };
            info!(documents = store.len(), "Using in-memory document store");
            Ok(Arc::new(store))
        }
        DocumentStoreBackend::Firestore => {
            let project_id = config.firebase.project_id.as_deref().ok_or_else(|| {
                AppError::config("FIREBASE_PROJECT_ID is required for the firestore backend")
            })?;
            let credentials = FirestoreCredentials::from_config(&config.firebase)?;
            let store = FirestoreDocumentStore::new(
                project_id,
                config.firebase.emulator_host.as_deref(),
                credentials,
            )?;
            info!(project_id = %project_id, "Using Firestore document store");
            Ok(Arc::new(store))
        }
    }
}
