// ABOUTME: Document store error types for profile and record lookups
// ABOUTME: Structured errors that convert into AppError at the session boundary
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{AppError, ErrorCode};

/// Errors raised by document store backends and the profile loader.
///
/// Backends return these unmodified; the session layer decides how each one
/// surfaces to clients through the `From<DocumentError> for AppError` mapping.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DocumentError {
    /// The requested document does not exist
    #[error("Document '{collection}/{key}' not found")]
    NotFound {
        /// Collection path of the missing document
        collection: String,
        /// Key of the missing document
        key: String,
    },

    /// The backend could not be reached
    #[error("Document store '{backend}' unavailable: {reason}")]
    Unavailable {
        /// Backend name
        backend: &'static str,
        /// Transport-level failure description
        reason: String,
    },

    /// The backend answered with a non-success status
    #[error("Document store '{backend}' rejected the request with status {status}: {reason}")]
    Rejected {
        /// Backend name
        backend: &'static str,
        /// HTTP status returned by the backend
        status: u16,
        /// Body or message returned by the backend
        reason: String,
    },

    /// The backend returned a document that could not be decoded
    #[error("Malformed document at '{path}': {reason}")]
    Malformed {
        /// Full document path
        path: String,
        /// Decoding failure description
        reason: String,
    },

    /// Credentials for the backend could not be obtained
    #[error("Document store credentials unavailable: {reason}")]
    Credentials {
        /// Failure description
        reason: String,
    },
}

impl DocumentError {
    /// Create a "not found" error
    #[must_use]
    pub fn not_found(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            key: key.into(),
        }
    }

    /// Create an "unavailable" error
    #[must_use]
    pub fn unavailable(backend: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            backend,
            reason: reason.into(),
        }
    }

    /// Create a "malformed" error
    #[must_use]
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error reports a missing document
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<DocumentError> for AppError {
    fn from(error: DocumentError) -> Self {
        let code = match &error {
            DocumentError::NotFound { .. } => ErrorCode::ResourceNotFound,
            DocumentError::Unavailable { .. } => ErrorCode::ExternalServiceUnavailable,
            DocumentError::Credentials { .. } => ErrorCode::ExternalAuthFailed,
            DocumentError::Rejected { .. } | DocumentError::Malformed { .. } => {
                ErrorCode::ExternalServiceError
            }
        };
        Self::new(code, error.to_string())
    }
}
