// ABOUTME: Profile loader merging the base user record with its profile sub-record
// ABOUTME: Fails with not-found when the base record is absent; profile absence falls back to defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::documents::DocumentStore;
use crate::errors::DocumentError;
use health_mentor_core::constants::{collections, fields};
use health_mentor_core::models::{Record, UserProfile};

/// Reads user records from the document store and normalizes them
#[derive(Clone)]
pub struct ProfileLoader {
    store: Arc<dyn DocumentStore>,
}

impl ProfileLoader {
    /// Create a loader over the given store
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Fetch the merged raw record for `user_id`
    ///
    /// Profile fields override base fields on key collision. The user id is
    /// injected when neither record carries one.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::NotFound` when the base user record does not
    /// exist; store failures propagate unchanged.
    pub async fn load_record(&self, user_id: &str) -> Result<Record, DocumentError> {
        let mut merged = self
            .store
            .get(collections::USERS, user_id)
            .await?
            .ok_or_else(|| DocumentError::not_found(collections::USERS, user_id))?;

        let profile = self
            .store
            .get(
                &collections::profile_collection(user_id),
                collections::PROFILE_DOCUMENT,
            )
            .await?;
        debug!(has_profile = profile.is_some(), "profile sub-record lookup");

        if let Some(profile) = profile {
            merged.extend(profile);
        }
        merged
            .entry(fields::USER_ID)
            .or_insert_with(|| Value::String(user_id.to_owned()));

        Ok(merged)
    }

    /// Load and normalize the profile for `user_id`
    ///
    /// # Errors
    ///
    /// See [`ProfileLoader::load_record`].
    #[instrument(skip(self), fields(backend = self.store.backend_name()))]
    pub async fn load(&self, user_id: &str) -> Result<UserProfile, DocumentError> {
        let record = self.load_record(user_id).await?;
        Ok(UserProfile::from_record(&record))
    }
}
