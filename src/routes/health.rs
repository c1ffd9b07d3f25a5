// ABOUTME: Health check route handlers for service monitoring and status endpoints
// ABOUTME: Liveness reports the service is up; readiness probes the model backend
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Health check routes for service monitoring
//!
//! `/health` never touches dependencies. `/ready` answers 503 while the model
//! backend cannot be reached.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tracing::warn;

use crate::constants::{routes, service};
use crate::resources::ServerResources;

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create all health check routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(routes::HEALTH, get(Self::health))
            .route(routes::READY, get(Self::ready))
            .with_state(resources)
    }

    async fn health() -> Json<serde_json::Value> {
        Json(serde_json::json!({
            "status": "healthy",
            "service": service::SERVICE_NAME,
            "version": service::SERVICE_VERSION,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }))
    }

    async fn ready(State(resources): State<Arc<ServerResources>>) -> Response {
        let provider = resources.orchestrator.provider();
        let (reachable, detail) = match provider.health_check().await {
            Ok(reachable) => (reachable, None),
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "model backend health check failed");
                (false, Some(e.message))
            }
        };

        let status = if reachable {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        let body = serde_json::json!({
            "status": if reachable { "ready" } else { "not_ready" },
            "model_backend": {
                "provider": provider.name(),
                "reachable": reachable,
                "error": detail,
            },
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        (status, Json(body)).into_response()
    }
}
