// ABOUTME: Identity token verification contract consumed by the HTTP layer
// ABOUTME: The server only checks tokens issued elsewhere; it never issues its own
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Identity Verification
//!
//! Clients sign in with Firebase Authentication and send the resulting ID
//! token as `Authorization: Bearer <token>`. A [`TokenVerifier`] turns that
//! token into a [`VerifiedIdentity`] or an `AuthInvalid` / `AuthExpired` error.

pub mod accounts;
pub mod firebase;

pub use accounts::{AccountResponse, AccountService, SignupRequest};
pub use firebase::FirebaseTokenVerifier;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AppResult;

/// Identity established from a verified token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    /// Stable subject identifier (Firebase UID)
    pub subject_id: String,
    /// Email claim, when present
    pub email: Option<String>,
}

/// Verifies bearer tokens
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify `token` and return the identity it carries
    ///
    /// # Errors
    ///
    /// Returns `AuthInvalid` or `AuthExpired` for unacceptable tokens, or an
    /// upstream error when signing keys cannot be fetched.
    async fn verify(&self, token: &str) -> AppResult<VerifiedIdentity>;
}
