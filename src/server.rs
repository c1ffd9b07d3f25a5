// ABOUTME: HTTP server assembly for the health mentor backend
// ABOUTME: Composes route groups, identity middleware, CORS and request tracing, then serves with graceful shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware, Router};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::errors::{AppError, AppResult};
use crate::middleware::{request_id_layers, require_identity, setup_cors, trace_layer, IdentityState};
use crate::resources::ServerResources;
use crate::routes::{AccountRoutes, ChatRoutes, HealthRoutes, NutritionRoutes};

/// The health mentor HTTP server
pub struct MentorServer {
    resources: Arc<ServerResources>,
}

impl MentorServer {
    /// Create a server over shared resources
    #[must_use]
    pub const fn new(resources: Arc<ServerResources>) -> Self {
        Self { resources }
    }

    /// Build the full router
    ///
    /// Account, chat and nutrition routes sit behind bearer-token verification
    /// when a verifier is configured. Health routes are always open.
    #[must_use]
    pub fn router(&self) -> Router {
        let mut api = Router::new()
            .merge(AccountRoutes::routes(Arc::clone(&self.resources)))
            .merge(ChatRoutes::routes(Arc::clone(&self.resources)))
            .merge(NutritionRoutes::routes(Arc::clone(&self.resources)));

        if let Some(verifier) = &self.resources.verifier {
            api = api.route_layer(middleware::from_fn_with_state(
                IdentityState::new(Arc::clone(verifier)),
                require_identity,
            ));
        }

        let (set_request_id, propagate_request_id) = request_id_layers();
        Router::new()
            .merge(api)
            .merge(HealthRoutes::routes(Arc::clone(&self.resources)))
            .layer(setup_cors(&self.resources.config))
            .layer(propagate_request_id)
            .layer(trace_layer())
            .layer(set_request_id)
    }

    /// Bind `host:port` and serve until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid, the port cannot be bound,
    /// or the server fails while running.
    pub async fn run(self, host: &str, port: u16) -> AppResult<()> {
        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| AppError::config(format!("Invalid listen address {host}:{port}: {e}")))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

        self.serve(listener).await
    }

    /// Serve on an already bound listener until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails while running.
    pub async fn serve(self, listener: TcpListener) -> AppResult<()> {
        let local = listener
            .local_addr()
            .map_err(|e| AppError::internal(format!("Listener has no local address: {e}")))?;
        info!(address = %local, "HTTP server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| AppError::internal(format!("HTTP server error: {e}")))?;

        info!("HTTP server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
