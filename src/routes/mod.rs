// ABOUTME: Route module organization for the health mentor HTTP endpoints
// ABOUTME: Account, chat, nutrition and health routers plus the shared JSON body extractor
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Route module
//!
//! Each domain module holds route definitions and thin handlers that delegate
//! to the mentor and nutrition services.

/// Sign-up and sign-in bookkeeping routes
pub mod accounts;
/// Mentor chat routes (complete, streamed, history)
pub mod chat;
/// Health check and readiness routes
pub mod health;
/// Food image analysis routes
pub mod nutrition;

pub use accounts::AccountRoutes;
pub use chat::ChatRoutes;
pub use health::HealthRoutes;
pub use nutrition::NutritionRoutes;

use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

use crate::errors::{AppError, ErrorCode};
use crate::middleware::request_id;

/// JSON body extractor whose rejections use the application error format
///
/// Malformed JSON, a wrong content type, or missing fields become 400
/// `INVALID_INPUT`; an oversized body becomes 413.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let correlation = request_id(req.headers());
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                let error = json_rejection_error(&rejection);
                Err(match correlation {
                    Some(id) => error.with_request_id(id),
                    None => error,
                })
            }
        }
    }
}

fn json_rejection_error(rejection: &JsonRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::new(ErrorCode::PayloadTooLarge, rejection.body_text())
    } else {
        AppError::invalid_input(rejection.body_text())
    }
}

/// Attach the request's correlation id to an error
pub(crate) fn with_request_id(error: AppError, headers: &HeaderMap) -> AppError {
    match request_id(headers) {
        Some(id) => error.with_request_id(id),
        None => error,
    }
}
