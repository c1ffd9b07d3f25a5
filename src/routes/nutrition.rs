// ABOUTME: Nutrition route handlers for food photo analysis
// ABOUTME: Accepts a multipart image upload and returns the vision model's nutrition estimate
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Nutrition routes
//!
//! `POST /nutrition/analyze` takes `multipart/form-data` with one `file` field.
//! The upload is analyzed in memory and never written to disk.

use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use http::HeaderMap;
use serde_json::Value;
use tracing::info;

use super::with_request_id;
use crate::constants::routes;
use crate::errors::{AppError, ErrorCode};
use crate::resources::ServerResources;

/// Multipart field carrying the image
const FILE_FIELD: &str = "file";

/// Nutrition routes handler
pub struct NutritionRoutes;

impl NutritionRoutes {
    /// Create all nutrition routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        let max_upload = resources.config.max_upload_bytes;
        Router::new()
            .route(routes::NUTRITION_ANALYZE, post(Self::analyze))
            .layer(DefaultBodyLimit::max(max_upload))
            .with_state(resources)
    }

    async fn analyze(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        multipart: Multipart,
    ) -> Result<Json<Value>, AppError> {
        let (image, content_type) = read_image(multipart)
            .await
            .map_err(|e| with_request_id(e, &headers))?;

        info!(bytes = image.len(), content_type = %content_type, "food image received");
        resources
            .analyzer
            .analyze(&image, &content_type)
            .await
            .map(Json)
            .map_err(|e| with_request_id(e, &headers))
    }
}

/// Pull the `file` field out of the form, skipping any other fields
async fn read_image(mut multipart: Multipart) -> Result<(Vec<u8>, String), AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_owned();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok((bytes.to_vec(), content_type));
    }
    Err(AppError::missing_field(FILE_FIELD))
}

fn multipart_error(error: MultipartError) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::new(ErrorCode::PayloadTooLarge, error.body_text())
    } else {
        AppError::invalid_input(error.body_text())
    }
}
