// ABOUTME: HTTP middleware for request tracing, identity checks, and CORS
// ABOUTME: Provides request ID propagation, bearer token enforcement, and origin policy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub mod auth;
pub mod cors;
pub mod tracing;

// Bearer token enforcement
pub use auth::{require_identity, IdentityState};

// CORS configuration
pub use cors::setup_cors;

// Request tracing and correlation
pub use self::tracing::{request_id, request_id_layers, trace_layer, RequestId, REQUEST_ID_HEADER};
