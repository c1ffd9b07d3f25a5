// ABOUTME: Account registration and sign-in bookkeeping for verified identities
// ABOUTME: Creates the base user record and default profile, and stamps last_login on sign-in
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Accounts
//!
//! Sign-up and sign-in happen against Firebase on the client. The backend only
//! keeps its own records in step:
//!
//! - sign-up writes `users/{uid}` and a default `users/{uid}/profile/data`
//!   carrying the daily targets
//! - sign-in stamps `last_login` on `users/{uid}`
//!
//! The user id is always the verified token subject. No backend token is issued.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::VerifiedIdentity;
use crate::constants::{collections, profile_defaults};
use crate::documents::DocumentStore;
use crate::errors::{AppError, AppResult};
use health_mentor_core::models::Record;

/// Sign-up details supplied alongside the verified token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    /// Display handle
    pub username: String,
    /// Full name
    pub full_name: String,
}

/// Account summary returned by sign-up and sign-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountResponse {
    /// User id (the verified token subject)
    pub user_id: String,
    /// Email claim of the token, or the stored email
    pub email: Option<String>,
    /// Stored display handle
    pub username: String,
}

/// Keeps user records in step with the identity provider
pub struct AccountService {
    documents: Arc<dyn DocumentStore>,
}

impl AccountService {
    /// Create a service over a document store
    #[must_use]
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    /// Register the verified user
    ///
    /// # Errors
    ///
    /// - `MissingRequiredField` for a blank username or full name
    /// - `ResourceAlreadyExists` when `users/{uid}` is already present
    /// - document store failures
    #[instrument(skip_all, fields(user_id = %identity.subject_id))]
    pub async fn signup(
        &self,
        identity: &VerifiedIdentity,
        request: SignupRequest,
    ) -> AppResult<AccountResponse> {
        let username = request.username.trim();
        if username.is_empty() {
            return Err(AppError::missing_field("username"));
        }
        let full_name = request.full_name.trim();
        if full_name.is_empty() {
            return Err(AppError::missing_field("full_name"));
        }

        let user_id = identity.subject_id.as_str();
        if self.documents.get(collections::USERS, user_id).await?.is_some() {
            info!("user already registered");
            return Err(AppError::already_exists("User"));
        }

        let user = record(json!({
            "user_id": user_id,
            "firebase_uid": user_id,
            "email": identity.email,
            "username": username,
            "full_name": full_name,
            "created_at": Utc::now().to_rfc3339(),
        }));
        self.documents
            .merge(collections::USERS, user_id, user)
            .await?;
        self.documents
            .merge(
                &collections::profile_collection(user_id),
                collections::PROFILE_DOCUMENT,
                default_profile(user_id),
            )
            .await?;

        info!("user registered");
        Ok(AccountResponse {
            user_id: user_id.to_owned(),
            email: identity.email.clone(),
            username: username.to_owned(),
        })
    }

    /// Record a sign-in by the verified user
    ///
    /// # Errors
    ///
    /// - `ResourceNotFound` when the user never signed up
    /// - document store failures
    #[instrument(skip_all, fields(user_id = %identity.subject_id))]
    pub async fn login(&self, identity: &VerifiedIdentity) -> AppResult<AccountResponse> {
        let user_id = identity.subject_id.as_str();
        let user = self
            .documents
            .get(collections::USERS, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;

        self.documents
            .merge(
                collections::USERS,
                user_id,
                record(json!({ "last_login": Utc::now().to_rfc3339() })),
            )
            .await?;

        let stored_text = |key: &str| user.get(key).and_then(Value::as_str).map(str::to_owned);
        Ok(AccountResponse {
            user_id: user_id.to_owned(),
            email: stored_text("email").or_else(|| identity.email.clone()),
            username: stored_text("username").unwrap_or_default(),
        })
    }
}

/// Profile written at sign-up: the user id plus the default daily targets
fn default_profile(user_id: &str) -> Record {
    record(json!({
        "user_id": user_id,
        "daily_calorie_goal": profile_defaults::DAILY_CALORIES,
        "daily_step_goal": profile_defaults::DAILY_STEPS,
        "daily_distance_goal": profile_defaults::DAILY_DISTANCE_KM,
        "daily_active_minutes_goal": profile_defaults::DAILY_ACTIVE_MINUTES,
        "daily_protein_goal": profile_defaults::DAILY_PROTEIN_G,
        "daily_carbs_goal": profile_defaults::DAILY_CARBS_G,
        "daily_fats_goal": profile_defaults::DAILY_FATS_G,
    }))
}

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}
