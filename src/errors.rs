// ABOUTME: Error type re-exports for the server crate
// ABOUTME: The error model lives in health-mentor-core and is shared with the domain types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Unified error handling
//!
//! All fallible server operations return [`AppResult`]. The HTTP mapping of
//! [`AppError`] (status code plus `{"error": {...}}` body) is provided by the
//! core crate's `http-response` feature.

pub use health_mentor_core::errors::{
    AppError, AppResult, DocumentError, ErrorCode, ErrorResponse, ErrorResponseDetails,
};
