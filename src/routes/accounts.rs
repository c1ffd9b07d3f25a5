// ABOUTME: Account route handlers keeping backend user records in step with sign-up and sign-in
// ABOUTME: Both routes act on the verified token subject and never issue tokens of their own
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Account routes
//!
//! - `POST /auth/signup`: create the user record and default profile, 201
//! - `POST /auth/login`: stamp `last_login`, 200
//!
//! Both need a verified identity and answer 401 `AUTH_REQUIRED` when
//! verification is disabled.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Extension, Json, Router};
use http::{HeaderMap, StatusCode};

use super::{with_request_id, JsonBody};
use crate::auth::{AccountResponse, SignupRequest, VerifiedIdentity};
use crate::constants::routes;
use crate::errors::AppError;
use crate::resources::ServerResources;

/// Account routes handler
pub struct AccountRoutes;

impl AccountRoutes {
    /// Create all account routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(routes::SIGNUP, post(Self::signup))
            .route(routes::LOGIN, post(Self::login))
            .with_state(resources)
    }

    fn require(
        identity: Option<Extension<VerifiedIdentity>>,
    ) -> Result<VerifiedIdentity, AppError> {
        identity
            .map(|Extension(identity)| identity)
            .ok_or_else(AppError::auth_required)
    }

    async fn signup(
        State(resources): State<Arc<ServerResources>>,
        identity: Option<Extension<VerifiedIdentity>>,
        headers: HeaderMap,
        JsonBody(request): JsonBody<SignupRequest>,
    ) -> Result<(StatusCode, Json<AccountResponse>), AppError> {
        let identity = Self::require(identity).map_err(|e| with_request_id(e, &headers))?;
        resources
            .accounts
            .signup(&identity, request)
            .await
            .map(|account| (StatusCode::CREATED, Json(account)))
            .map_err(|e| with_request_id(e, &headers))
    }

    async fn login(
        State(resources): State<Arc<ServerResources>>,
        identity: Option<Extension<VerifiedIdentity>>,
        headers: HeaderMap,
    ) -> Result<Json<AccountResponse>, AppError> {
        let identity = Self::require(identity).map_err(|e| with_request_id(e, &headers))?;
        resources
            .accounts
            .login(&identity)
            .await
            .map(Json)
            .map_err(|e| with_request_id(e, &headers))
    }
}
