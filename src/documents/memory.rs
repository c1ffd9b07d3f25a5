// ABOUTME: Process-local document store backed by a concurrent map
// ABOUTME: Used for demo mode and tests, optionally seeded from a JSON file
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, warn};

use super::DocumentStore;
use crate::errors::{AppError, AppResult, DocumentError};
use health_mentor_core::models::Record;

const BACKEND: &str = "memory";

/// In-memory document store
///
/// Documents are keyed by their full path `"{collection}/{key}"`.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: DashMap<String, Record>,
}

impl InMemoryDocumentStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from a seed file
    ///
    /// The file is a JSON object mapping full document paths to records:
    ///
    /// ```json
    /// {
    ///   "users/abc123": {"age": 34, "gender": "Female"},
    ///   "users/abc123/profile/data": {"has_hypertension": true}
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or is not a
    /// JSON object of objects.
    pub fn from_seed_file(path: &Path) -> AppResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("Cannot read seed file {}: {e}", path.display()))
        })?;
        let seed: Value = serde_json::from_str(&raw).map_err(|e| {
            AppError::config(format!("Seed file {} is not valid JSON: {e}", path.display()))
        })?;
        Self::from_seed(seed)
    }

    /// Build a store from an already parsed seed object
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the seed has the wrong shape.
    pub fn from_seed(seed: Value) -> AppResult<Self> {
        let Value::Object(entries) = seed else {
            return Err(AppError::config("Seed must be a JSON object"));
        };

        let store = Self::new();
        for (path, document) in entries {
            let Value::Object(record) = document else {
                return Err(AppError::config(format!(
                    "Seed entry '{path}' must be a JSON object"
                )));
            };
            if split_path(&path).is_none() {
                return Err(AppError::config(format!(
                    "Seed entry '{path}' must look like 'collection/key'"
                )));
            }
            store.documents.insert(path, record);
        }
        Ok(store)
    }

    /// Number of stored documents
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the store holds no documents
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn document_path(collection: &str, key: &str) -> String {
    format!("{}/{key}", collection.trim_end_matches('/'))
}

fn split_path(path: &str) -> Option<(&str, &str)> {
    path.rsplit_once('/')
        .filter(|(collection, key)| !collection.is_empty() && !key.is_empty())
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Record>, DocumentError> {
        let path = document_path(collection, key);
        let document = self.documents.get(&path).map(|entry| entry.value().clone());
        debug!(path = %path, found = document.is_some(), "memory document lookup");
        Ok(document)
    }

    async fn merge(
        &self,
        collection: &str,
        key: &str,
        fields: Record,
    ) -> Result<(), DocumentError> {
        if key.is_empty() || key.contains('/') {
            warn!(collection = %collection, key = %key, "rejected document key");
            return Err(DocumentError::Rejected {
                backend: BACKEND,
                status: 400,
                reason: format!("invalid document key '{key}'"),
            });
        }

        self.documents
            .entry(document_path(collection, key))
            .or_default()
            .extend(fields);
        Ok(())
    }
}
