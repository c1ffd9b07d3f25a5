// ABOUTME: Firebase ID token verifier using Google's signing certificates
// ABOUTME: Checks RS256 signature, issuer, audience and expiry with certificate caching
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Firebase ID token verification
//!
//! - Signing certificates come from Google's `securetoken` x509 endpoint
//! - Certificates are cached for the `Cache-Control: max-age` the endpoint
//!   sends, never less than five minutes
//! - Tokens must be RS256, issued by `https://securetoken.google.com/<project>`
//!   for audience `<project>`, and unexpired

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use x509_parser::prelude::*;

use super::{TokenVerifier, VerifiedIdentity};
use crate::errors::{AppError, AppResult};
use crate::logging::AppLogger;

/// Google's Firebase signing certificate endpoint
const FIREBASE_CERTS_URL: &str =
    "https://www.googleapis.com/robot/v1/metadata/x509/securetoken@system.gserviceaccount.com";

/// Issuer prefix; the project id completes it
const FIREBASE_ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// Minimum cache TTL in seconds (5 minutes)
const MIN_CACHE_TTL_SECS: i64 = 300;

/// Cache TTL when the endpoint sends no `max-age` (1 hour)
const DEFAULT_CACHE_TTL_SECS: i64 = 3600;

const SERVICE_LABEL: &str = "Firebase Auth";

struct CachedKeys {
    /// Key id to PEM-encoded public key
    keys: HashMap<String, String>,
    expires_at: DateTime<Utc>,
}

/// Claims of a Firebase ID token that the server reads
#[derive(Debug, Clone, Deserialize)]
struct FirebaseClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

/// Verifies Firebase ID tokens for one project
pub struct FirebaseTokenVerifier {
    project_id: String,
    certs_url: String,
    http_client: Client,
    cached_keys: Arc<RwLock<Option<CachedKeys>>>,
}

impl FirebaseTokenVerifier {
    /// Create a verifier for `project_id`
    #[must_use]
    pub fn new(project_id: impl Into<String>) -> Self {
        Self::with_certs_url(project_id, FIREBASE_CERTS_URL)
    }

    /// Create a verifier that fetches certificates from `certs_url`
    #[must_use]
    pub fn with_certs_url(project_id: impl Into<String>, certs_url: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            certs_url: certs_url.into(),
            http_client: Client::new(),
            cached_keys: Arc::new(RwLock::new(None)),
        }
    }

    /// Project whose tokens are accepted
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn validate(&self, token: &str) -> AppResult<FirebaseClaims> {
        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "Failed to decode Firebase token header");
            AppError::auth_invalid("Invalid token format")
        })?;

        if header.alg != Algorithm::RS256 {
            return Err(AppError::auth_invalid("Unexpected token algorithm"));
        }

        let kid = header.kid.ok_or_else(|| {
            debug!("Firebase token missing key ID (kid) in header");
            AppError::auth_invalid("Token missing key ID")
        })?;

        let pem_key = self.get_public_key(&kid).await?;
        let decoding_key = DecodingKey::from_rsa_pem(pem_key.as_bytes()).map_err(|e| {
            warn!(error = %e, kid = %kid, "Failed to create decoding key from PEM");
            AppError::internal(format!("Invalid public key: {e}"))
        })?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[format!("{FIREBASE_ISSUER_PREFIX}{}", self.project_id)]);

        let token_data =
            decode::<FirebaseClaims>(token, &decoding_key, &validation).map_err(|e| {
                debug!(error = %e, "Firebase token validation failed");
                match e.kind() {
                    ErrorKind::ExpiredSignature => AppError::auth_expired(),
                    ErrorKind::InvalidAudience => AppError::auth_invalid("Invalid token audience"),
                    ErrorKind::InvalidIssuer => AppError::auth_invalid("Invalid token issuer"),
                    _ => AppError::auth_invalid("Invalid token"),
                }
            })?;

        if token_data.claims.sub.is_empty() {
            return Err(AppError::auth_invalid("Token has an empty subject"));
        }
        Ok(token_data.claims)
    }

    /// Public key for `kid`, refreshing the cache when it is stale or lacks the key
    async fn get_public_key(&self, kid: &str) -> AppResult<String> {
        if let Some(key) = self.try_get_cached_key(kid).await {
            return Ok(key);
        }

        self.refresh_keys().await?;

        let cache = self.cached_keys.read().await;
        cache
            .as_ref()
            .and_then(|cached| cached.keys.get(kid).cloned())
            .ok_or_else(|| {
                debug!(kid = %kid, "Firebase public key not found for kid");
                AppError::auth_invalid("Unknown token signing key")
            })
    }

    async fn try_get_cached_key(&self, kid: &str) -> Option<String> {
        let cache = self.cached_keys.read().await;
        cache
            .as_ref()
            .filter(|cached| cached.expires_at > Utc::now())
            .and_then(|cached| cached.keys.get(kid).cloned())
    }

    async fn refresh_keys(&self) -> AppResult<()> {
        info!("Fetching Firebase public keys");

        let response = self
            .http_client
            .get(&self.certs_url)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to fetch Firebase public keys");
                AppError::external_unavailable(SERVICE_LABEL, format!("Cannot fetch signing keys: {e}"))
            })?;

        let cache_ttl = response
            .headers()
            .get("cache-control")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_max_age)
            .unwrap_or(DEFAULT_CACHE_TTL_SECS)
            .max(MIN_CACHE_TTL_SECS);

        let certs: HashMap<String, String> = response.json().await.map_err(|e| {
            warn!(error = %e, "Failed to parse Firebase public keys response");
            AppError::external_service(SERVICE_LABEL, format!("Invalid signing key response: {e}"))
        })?;

        let keys = convert_certs_to_keys(certs)?;
        let expires_at = Utc::now() + Duration::seconds(cache_ttl);
        info!(
            num_keys = keys.len(),
            cache_ttl_secs = cache_ttl,
            "Firebase public keys cached"
        );

        *self.cached_keys.write().await = Some(CachedKeys { keys, expires_at });
        Ok(())
    }
}

#[async_trait]
impl TokenVerifier for FirebaseTokenVerifier {
    async fn verify(&self, token: &str) -> AppResult<VerifiedIdentity> {
        match self.validate(token).await {
            Ok(claims) => {
                AppLogger::log_auth_event(Some(&claims.sub), true, "firebase id token");
                Ok(VerifiedIdentity {
                    subject_id: claims.sub,
                    email: claims.email,
                })
            }
            Err(e) => {
                AppLogger::log_auth_event(None, false, &e.message);
                Err(e)
            }
        }
    }
}

fn convert_certs_to_keys(certs: HashMap<String, String>) -> AppResult<HashMap<String, String>> {
    let keys: HashMap<String, String> = certs
        .into_iter()
        .filter_map(|(kid, cert_pem)| match extract_public_key_from_cert(&cert_pem) {
            Ok(public_key_pem) => Some((kid, public_key_pem)),
            Err(e) => {
                warn!(kid = %kid, error = %e, "Failed to extract public key from certificate");
                None
            }
        })
        .collect();

    if keys.is_empty() {
        return Err(AppError::external_service(
            SERVICE_LABEL,
            "No valid signing keys in certificate response",
        ));
    }
    Ok(keys)
}

/// `max-age` seconds from a Cache-Control header
fn parse_max_age(cache_control: &str) -> Option<i64> {
    cache_control
        .split(',')
        .map(str::trim)
        .find_map(|directive| directive.strip_prefix("max-age="))
        .and_then(|value| value.parse().ok())
}

/// PEM `PUBLIC KEY` block for the subject key of an x509 certificate
fn extract_public_key_from_cert(cert_pem: &str) -> AppResult<String> {
    let (_, pem) = parse_x509_pem(cert_pem.as_bytes())
        .map_err(|e| AppError::internal(format!("Failed to parse X.509 PEM: {e}")))?;
    let (_, cert) = X509Certificate::from_der(&pem.contents)
        .map_err(|e| AppError::internal(format!("Failed to parse X.509 certificate: {e}")))?;

    let encoded = STANDARD.encode(cert.public_key().raw);
    let body = encoded
        .as_bytes()
        .chunks(64)
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!(
        "-----BEGIN PUBLIC KEY-----\n{body}\n-----END PUBLIC KEY-----"
    ))
}
