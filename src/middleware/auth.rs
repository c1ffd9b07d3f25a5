// ABOUTME: Bearer token middleware enforcing verified identities on API routes
// ABOUTME: Rejects requests without a valid token and stores the identity in request extensions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::header::AUTHORIZATION;
use http::HeaderMap;
use tracing::debug;

use super::tracing::request_id;
use crate::auth::TokenVerifier;
use crate::errors::AppError;

/// State for [`require_identity`]
#[derive(Clone)]
pub struct IdentityState {
    verifier: Arc<dyn TokenVerifier>,
}

impl IdentityState {
    /// Wrap a token verifier
    #[must_use]
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { verifier }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Require `Authorization: Bearer <token>` on every request
///
/// A missing token yields 401 `AUTH_REQUIRED`; a rejected one yields 401
/// `AUTH_INVALID` or `AUTH_EXPIRED`. On success the
/// [`VerifiedIdentity`](crate::auth::VerifiedIdentity) is inserted into the
/// request extensions.
///
/// ```rust,no_run
/// use axum::{middleware, routing::get, Router};
/// use health_mentor_server::middleware::{require_identity, IdentityState};
///
/// # async fn handler() -> &'static str { "" }
/// # fn example(state: IdentityState) {
/// let app: Router = Router::new()
///     .route("/", get(handler))
///     .layer(middleware::from_fn_with_state(state, require_identity));
/// # }
/// ```
pub async fn require_identity(
    State(state): State<IdentityState>,
    mut req: Request,
    next: Next,
) -> Response {
    let correlation = request_id(req.headers());
    let attach = |error: AppError| match &correlation {
        Some(id) => error.with_request_id(id.clone()),
        None => error,
    };

    let Some(token) = bearer_token(req.headers()).map(ToOwned::to_owned) else {
        debug!(path = %req.uri().path(), "request without bearer token");
        return attach(AppError::auth_required()).into_response();
    };

    match state.verifier.verify(&token).await {
        Ok(identity) => {
            tracing::Span::current().record("user_id", identity.subject_id.as_str());
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(error) => attach(error).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, "Bearer   ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, "Bearer tok123".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("tok123"));
    }
}
