// ABOUTME: Credential sources for the Firestore REST client
// ABOUTME: Emulator, static access token, or service-account JWT-bearer exchange with token caching
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Firestore credentials
//!
//! A service account key is exchanged for an OAuth access token with the
//! JWT-bearer grant (RFC 7523). The token is cached and refreshed one minute
//! before it expires.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::FirebaseConfig;
use crate::errors::{AppError, AppResult, DocumentError};

/// OAuth scope granting Firestore access
const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Token endpoint used when the key file does not name one
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for the signed assertion
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh margin before the cached access token expires
const REFRESH_MARGIN_SECS: i64 = 60;

/// Fields of a Google service-account key file that the exchange needs
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Service account email, used as the assertion issuer
    pub client_email: String,
    /// PEM-encoded RSA private key
    pub private_key: String,
    /// OAuth token endpoint
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    /// Project the key belongs to
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_owned()
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[REDACTED]")
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish()
    }
}

impl ServiceAccountKey {
    /// Read a key file from disk
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file is missing or malformed.
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::config(format!(
                "Cannot read Firebase credentials {}: {e}",
                path.display()
            ))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            AppError::config(format!(
                "Firebase credentials {} are not a service account key: {e}",
                path.display()
            ))
        })
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Exchanges a service account key for access tokens
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    http_client: Client,
    cached: Arc<RwLock<Option<CachedToken>>>,
}

impl ServiceAccountTokenSource {
    /// Create a token source for the given key
    #[must_use]
    pub fn new(key: ServiceAccountKey, http_client: Client) -> Self {
        Self {
            key,
            http_client,
            cached: Arc::new(RwLock::new(None)),
        }
    }

    async fn cached_token(&self) -> Option<String> {
        let cache = self.cached.read().await;
        cache
            .as_ref()
            .filter(|cached| cached.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > Utc::now())
            .map(|cached| cached.token.clone())
    }

    /// Return a valid access token, exchanging a new assertion when needed
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::Credentials` if signing or the exchange fails.
    pub async fn access_token(&self) -> Result<String, DocumentError> {
        if let Some(token) = self.cached_token().await {
            return Ok(token);
        }

        let assertion = self.sign_assertion()?;
        let body = format!(
            "grant_type={}&assertion={}",
            urlencoding::encode(JWT_BEARER_GRANT),
            urlencoding::encode(&assertion)
        );

        debug!(token_uri = %self.key.token_uri, "Exchanging service account assertion");
        let response = self
            .http_client
            .post(&self.key.token_uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| credentials_error(format!("token exchange failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, "Service account token exchange rejected");
            return Err(credentials_error(format!(
                "token endpoint answered {status}: {text}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| credentials_error(format!("invalid token response: {e}")))?;

        let lifetime = token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
        let expires_at = Utc::now() + Duration::seconds(lifetime);
        info!(
            client_email = %self.key.client_email,
            expires_at = %expires_at,
            "Firestore access token refreshed"
        );

        let access_token = token.access_token;
        *self.cached.write().await = Some(CachedToken {
            token: access_token.clone(),
            expires_at,
        });
        Ok(access_token)
    }

    fn sign_assertion(&self) -> Result<String, DocumentError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: DATASTORE_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| credentials_error(format!("invalid private key: {e}")))?;

        encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| credentials_error(format!("cannot sign assertion: {e}")))
    }
}

fn credentials_error(reason: String) -> DocumentError {
    DocumentError::Credentials { reason }
}

/// How the Firestore client authenticates
pub enum FirestoreCredentials {
    /// Local emulator; requests carry no credentials
    Emulator,
    /// Pre-issued OAuth access token
    StaticToken(String),
    /// Service account key exchanged for access tokens
    ServiceAccount(ServiceAccountTokenSource),
}

impl FirestoreCredentials {
    /// Select credentials from configuration
    ///
    /// Precedence: emulator host, static access token, service account key file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if none is configured or the key file is unusable.
    pub fn from_config(config: &FirebaseConfig) -> AppResult<Self> {
        if config.emulator_host.is_some() {
            return Ok(Self::Emulator);
        }
        if let Some(token) = &config.access_token {
            return Ok(Self::StaticToken(token.clone()));
        }
        if let Some(path) = &config.credentials_path {
            let key = ServiceAccountKey::from_file(path)?;
            return Ok(Self::ServiceAccount(ServiceAccountTokenSource::new(
                key,
                Client::new(),
            )));
        }
        Err(AppError::config(
            "Firestore needs FIRESTORE_EMULATOR_HOST, FIRESTORE_ACCESS_TOKEN or FIREBASE_CREDENTIALS_PATH",
        ))
    }

    /// Bearer token for the next request, if any
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::Credentials` if a token cannot be obtained.
    pub async fn bearer_token(&self) -> Result<Option<String>, DocumentError> {
        match self {
            Self::Emulator => Ok(None),
            Self::StaticToken(token) => Ok(Some(token.clone())),
            Self::ServiceAccount(source) => source.access_token().await.map(Some),
        }
    }
}

impl fmt::Debug for FirestoreCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Emulator => f.write_str("Emulator"),
            Self::StaticToken(_) => f.write_str("StaticToken([REDACTED])"),
            Self::ServiceAccount(source) => f
                .debug_tuple("ServiceAccount")
                .field(&source.key.client_email)
                .finish(),
        }
    }
}
