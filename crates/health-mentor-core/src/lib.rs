// ABOUTME: Core types and constants for the health mentor backend
// ABOUTME: Foundation crate with error handling, the profile model, and shared constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Health Mentor Core
//!
//! Foundation crate providing shared types and constants for the health mentor
//! backend. This crate is designed to change infrequently, enabling incremental
//! compilation benefits in the workspace.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError`, `ErrorCode`, and `DocumentError`
//! - **constants**: Profile defaults, prompt fallback text, and collection names
//! - **models**: Normalized `UserProfile` and the shared boolean parser

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Application constants organized by domain
pub mod constants;

/// Core data models (`UserProfile`, `MedicalConditions`)
pub mod models;
