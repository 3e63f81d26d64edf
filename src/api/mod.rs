//! REST client for the CRM backend.
//!
//! Every collection lives under `{backend}/api/{plural}`. List endpoints
//! answer either with a bare array or with `{ "data": [...] }`; both are
//! funnelled through [`crate::record::normalize`].
//!
//! Modules:
//! - payload: field-mapped create bodies per record kind

pub mod payload;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::record::{normalize, Record, RecordKind};

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid {kind} payload: {message}")]
    Validation { kind: &'static str, message: String },
    #[error("{0} records cannot be updated")]
    Unsupported(&'static str),
    #[error("Invalid backend URL: {0}")]
    Url(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

// ============================================================================
// Backend seam
// ============================================================================

/// The read side of the backend the dashboard pipeline depends on.
#[async_trait]
pub trait CrmBackend: Send + Sync {
    /// Fetch and normalize one collection.
    async fn list(&self, kind: RecordKind) -> Result<Vec<Record>, ApiError>;

    /// Notes attached to one parent record. Parents without notes answer with
    /// an error status, which callers treat as an empty list.
    async fn notes_for_parent(&self, parent_id: &str) -> Result<Vec<Record>, ApiError>;
}

// ============================================================================
// Client
// ============================================================================

#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// `backend_url` is the server root; the `/api` prefix is appended here.
    pub fn new(backend_url: &str, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("{}/api", backend_url.trim_end_matches('/')),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/{segments...}` with every segment percent-encoded, so an id
    /// containing `/` or `?` stays a single path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, ApiError> {
        let mut url =
            reqwest::Url::parse(&self.base_url).map_err(|e| ApiError::Url(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Url(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(
        &self,
        method: reqwest::Method,
        segments: &[&str],
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        let builder = self
            .client
            .request(method, self.endpoint(segments)?)
            .header("Content-Type", "application/json");
        Ok(match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, ApiError> {
        let resp = request.send().await?;
        let status = resp.status();
        let text = match resp.text().await {
            Ok(text) => text,
            // An unreadable error body still reports the status.
            Err(_) if !status.is_success() => String::new(),
            Err(e) => return Err(e.into()),
        };

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(status, &text),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// GET `/{plural}`.
    pub async fn list_records(&self, kind: RecordKind) -> Result<Vec<Record>, ApiError> {
        let body = self
            .send(self.request(reqwest::Method::GET, &[kind.plural()])?)
            .await?;
        let records = normalize(&body);
        log::debug!("Fetched {} {}", records.len(), kind.plural());
        Ok(records)
    }

    /// GET `/{plural}/{id}`. Accepts a bare object or `{ "data": {...} }`.
    pub async fn get(&self, kind: RecordKind, id: &str) -> Result<Option<Record>, ApiError> {
        let body = self
            .send(self.request(reqwest::Method::GET, &[kind.plural(), id])?)
            .await?;
        let inner = match body {
            Value::Object(mut map) if matches!(map.get("data"), Some(Value::Object(_))) => {
                map.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        };
        Ok(Record::from_value(inner))
    }

    /// POST `/{plural}` with an already-mapped body (see [`payload`]).
    pub async fn create(&self, kind: RecordKind, body: &Value) -> Result<Value, ApiError> {
        log::info!("Creating {}", kind.singular());
        self.send(self.request(reqwest::Method::POST, &[kind.plural()])?.json(body))
            .await
    }

    /// PATCH `/{plural}/{id}`. The backend exposes no update for notes.
    pub async fn update(
        &self,
        kind: RecordKind,
        id: &str,
        patch: &Value,
    ) -> Result<Value, ApiError> {
        if kind == RecordKind::Note {
            return Err(ApiError::Unsupported(kind.plural()));
        }
        log::info!("Updating {} {}", kind.singular(), id);
        self.send(
            self.request(reqwest::Method::PATCH, &[kind.plural(), id])?
                .json(patch),
        )
        .await
    }

    /// DELETE `/{plural}/{id}`.
    pub async fn delete(&self, kind: RecordKind, id: &str) -> Result<(), ApiError> {
        log::info!("Deleting {} {}", kind.singular(), id);
        self.send(self.request(reqwest::Method::DELETE, &[kind.plural(), id])?)
            .await
            .map(|_| ())
    }

    /// GET `/notes/{parentId}`.
    pub async fn notes_by_parent(&self, parent_id: &str) -> Result<Vec<Record>, ApiError> {
        let body = self
            .send(self.request(reqwest::Method::GET, &["notes", parent_id])?)
            .await?;
        Ok(normalize(&body))
    }

    /// Legacy server-side search. Any failure degrades to an empty list;
    /// [`crate::search::filter_by_name`] is the primary search path.
    pub async fn search(&self, kind: RecordKind, query: &str) -> Vec<Record> {
        let result = match self.request(reqwest::Method::GET, &["search"]) {
            Ok(request) => {
                self.send(request.query(&[("type", kind.singular()), ("query", query)]))
                    .await
            }
            Err(e) => Err(e),
        };
        match result {
            Ok(body) => normalize(&body),
            Err(e) => {
                log::warn!("Search endpoint failed, returning no results: {}", e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl CrmBackend for ApiClient {
    async fn list(&self, kind: RecordKind) -> Result<Vec<Record>, ApiError> {
        self.list_records(kind).await
    }

    async fn notes_for_parent(&self, parent_id: &str) -> Result<Vec<Record>, ApiError> {
        self.notes_by_parent(parent_id).await
    }
}

/// Prefer the backend's `message` field; fall back to the raw body or the
/// status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Failed to fetch data")
                .to_string()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_appends_api_prefix() {
        let client = ApiClient::new("https://crm.example.com/", None);
        assert_eq!(client.base_url(), "https://crm.example.com/api");
        assert_eq!(
            client.endpoint(&["leads"]).unwrap().as_str(),
            "https://crm.example.com/api/leads"
        );
    }

    #[test]
    fn test_ids_are_escaped_as_one_segment() {
        let client = ApiClient::new("https://crm.example.com", None);
        let url = client.endpoint(&["accounts", "a/b?c#d"]).unwrap();
        assert_eq!(url.path(), "/api/accounts/a%2Fb%3Fc%23d");
        assert!(url.query().is_none());
    }

    #[test]
    fn test_invalid_backend_url() {
        let client = ApiClient::new("not a url", None);
        assert!(matches!(client.endpoint(&["leads"]), Err(ApiError::Url(_))));
    }

    #[test]
    fn test_blank_token_is_dropped() {
        let client = ApiClient::new("http://localhost", Some("  ".into()));
        assert!(client.token.is_none());
    }

    #[test]
    fn test_error_message_prefers_message_field() {
        let msg = error_message(
            StatusCode::BAD_REQUEST,
            r#"{"success":false,"message":"lastName is required"}"#,
        );
        assert_eq!(msg, "lastName is required");
        assert_eq!(error_message(StatusCode::NOT_FOUND, ""), "Not Found");
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "upstream down"), "upstream down");
    }

    #[test]
    fn test_not_found_classification() {
        let err = ApiError::Status {
            status: 404,
            message: "none".into(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(404));
        assert!(!ApiError::Unsupported("notes").is_not_found());
    }
}
