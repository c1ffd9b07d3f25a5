// ABOUTME: Firestore REST v1 document store with typed-value codec
// ABOUTME: Reads documents with GET and merges fields with PATCH plus an update mask
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Firestore Backend
//!
//! Firestore represents every field as a typed value object:
//!
//! ```json
//! {"fields": {"age": {"integerValue": "34"}, "asthma": {"booleanValue": true}}}
//! ```
//!
//! [`decode_fields`] turns that into a plain JSON [`Record`] and
//! [`encode_fields`] does the reverse, so the rest of the server never sees
//! the wire representation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Map, Number, Value};
use tracing::{debug, instrument, warn};

use super::{DocumentStore, FirestoreCredentials};
use crate::errors::{AppError, AppResult, DocumentError};
use health_mentor_core::models::Record;

const BACKEND: &str = "firestore";

const FIRESTORE_HOST: &str = "https://firestore.googleapis.com";

const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Firestore REST client implementing [`DocumentStore`]
pub struct FirestoreDocumentStore {
    client: Client,
    documents_url: String,
    credentials: FirestoreCredentials,
}

impl FirestoreDocumentStore {
    /// Create a client for the default database of `project_id`
    ///
    /// When `emulator_host` is set, requests go to `http://{emulator_host}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        project_id: &str,
        emulator_host: Option<&str>,
        credentials: FirestoreCredentials,
    ) -> AppResult<Self> {
        let host = emulator_host.map_or_else(|| FIRESTORE_HOST.to_owned(), |h| format!("http://{h}"));
        Self::with_base_url(&host, project_id, credentials)
    }

    /// Create a client against an explicit host (scheme and authority)
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_base_url(
        host: &str,
        project_id: &str,
        credentials: FirestoreCredentials,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            documents_url: format!(
                "{}/v1/projects/{}/databases/(default)/documents",
                host.trim_end_matches('/'),
                urlencoding::encode(project_id)
            ),
            credentials,
        })
    }

    fn document_url(&self, collection: &str, key: &str) -> String {
        let path = collection
            .split('/')
            .chain(std::iter::once(key))
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{path}", self.documents_url)
    }

    async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, DocumentError> {
        Ok(match self.credentials.bearer_token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }
}

fn transport_error(e: &reqwest::Error) -> DocumentError {
    warn!(error = %e, "Firestore request failed");
    DocumentError::unavailable(BACKEND, e.to_string())
}

async fn rejected(response: reqwest::Response) -> DocumentError {
    let status = response.status().as_u16();
    let reason = response.text().await.unwrap_or_default();
    warn!(status, "Firestore rejected request");
    DocumentError::Rejected {
        backend: BACKEND,
        status,
        reason,
    }
}

#[async_trait]
impl DocumentStore for FirestoreDocumentStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    #[instrument(skip(self))]
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Record>, DocumentError> {
        let url = self.document_url(collection, key);
        let response = self
            .authorize(self.client.get(&url))
            .await?
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!("Firestore document absent");
                Ok(None)
            }
            status if status.is_success() => {
                let document: Value = response
                    .json()
                    .await
                    .map_err(|e| DocumentError::malformed(format!("{collection}/{key}"), e.to_string()))?;
                let fields = document.get("fields").cloned().unwrap_or_else(|| json!({}));
                decode_fields(&fields)
                    .map(Some)
                    .map_err(|reason| DocumentError::malformed(format!("{collection}/{key}"), reason))
            }
            _ => Err(rejected(response).await),
        }
    }

    #[instrument(skip(self, fields), fields(field_count = fields.len()))]
    async fn merge(
        &self,
        collection: &str,
        key: &str,
        fields: Record,
    ) -> Result<(), DocumentError> {
        let mask: Vec<(&str, String)> = fields
            .keys()
            .map(|name| ("updateMask.fieldPaths", field_path(name)))
            .collect();
        let body = json!({ "fields": encode_fields(&fields) });

        let request = self
            .client
            .patch(self.document_url(collection, key))
            .query(&mask)
            .json(&body);
        let response = self
            .authorize(request)
            .await?
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(rejected(response).await)
        }
    }
}

/// Quote a field name for an update mask when it is not a simple identifier
fn field_path(name: &str) -> String {
    let simple = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if simple {
        name.to_owned()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

// ============================================================================
// Value codec
// ============================================================================

/// Encode a plain JSON record as a Firestore `fields` map
#[must_use]
pub fn encode_fields(record: &Record) -> Value {
    Value::Object(
        record
            .iter()
            .map(|(name, value)| (name.clone(), encode_value(value)))
            .collect(),
    )
}

fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => n.as_i64().map_or_else(
            || json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
            |i| json!({ "integerValue": i.to_string() }),
        ),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Decode a Firestore `fields` map into a plain JSON record
///
/// # Errors
///
/// Returns a description of the first field that is not a valid typed value.
pub fn decode_fields(fields: &Value) -> Result<Record, String> {
    let Value::Object(map) = fields else {
        return Err("fields is not an object".to_owned());
    };

    map.iter()
        .map(|(name, typed)| {
            decode_value(typed)
                .map(|value| (name.clone(), value))
                .map_err(|reason| format!("field '{name}': {reason}"))
        })
        .collect()
}

fn decode_value(typed: &Value) -> Result<Value, String> {
    let Some((kind, inner)) = typed.as_object().and_then(|obj| obj.iter().next()) else {
        return Err("empty typed value".to_owned());
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| "booleanValue is not a boolean".to_owned()),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            parsed
                .map(|i| Value::Number(i.into()))
                .ok_or_else(|| "integerValue is not an integer".to_owned())
        }
        "doubleValue" => {
            let parsed = match inner {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.parse::<f64>().ok(),
                _ => None,
            };
            parsed
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| "doubleValue is not a finite number".to_owned())
        }
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner
            .as_str()
            .map(|s| Value::String(s.to_owned()))
            .ok_or_else(|| format!("{kind} is not a string")),
        "geoPointValue" => Ok(inner.clone()),
        "arrayValue" => inner
            .get("values")
            .and_then(Value::as_array)
            .map_or_else(
                || Ok(Vec::new()),
                |values| values.iter().map(decode_value).collect(),
            )
            .map(Value::Array),
        "mapValue" => inner
            .get("fields")
            .map_or_else(|| Ok(Map::new()), decode_fields)
            .map(Value::Object),
        other => Err(format!("unsupported value type '{other}'")),
    }
}
