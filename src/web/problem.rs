//! RFC 7807 problem documents.
//!
//! Every non-2xx response body is built here. The `detail` string is masked
//! before it reaches either the response or the log, and each document
//! carries a fresh correlation id that also appears in the log record.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

pub const DEFAULT_TYPE: &str = "about:blank";
pub const EMAIL_PLACEHOLDER: &str = "[EMAIL]";
pub const TOKEN_PLACEHOLDER: &str = "[TOKEN]";

const STRUCTURAL_KEYS: &[&str] = &["type", "title", "status", "detail", "correlation_id"];
const SENSITIVE_KEY_PARTS: &[&str] = &["password", "token", "secret", "key", "authorization"];

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").expect("Invalid email regex pattern")
});
static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:secret|token|key)_[A-Za-z0-9_]{10,}").expect("Invalid secret regex pattern")
});

/// Replaces e-mail addresses and `secret_`/`token_`/`key_` prefixed
/// identifiers with fixed placeholders.
pub fn mask_detail(detail: &str) -> String {
    let masked = EMAIL_PATTERN.replace_all(detail, EMAIL_PLACEHOLDER);
    SECRET_PATTERN
        .replace_all(&masked, TOKEN_PLACEHOLDER)
        .into_owned()
}

pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEY_PARTS.iter().any(|part| key.contains(part))
}

/// Copy of `extras` suitable for logging.
///
/// Note: only the log copy is filtered. The response body still carries
/// every extra the caller supplied.
pub fn redact_extras(extras: &Map<String, Value>) -> Map<String, Value> {
    extras
        .iter()
        .filter(|(key, _)| !is_sensitive_key(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct ProblemDocument {
    #[serde(rename = "type")]
    pub type_uri: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub correlation_id: Uuid,
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

impl ProblemDocument {
    pub fn build(
        status: StatusCode,
        title: &str,
        detail: &str,
        type_uri: Option<&str>,
        extras: Option<Map<String, Value>>,
    ) -> Self {
        let mut extras = extras.unwrap_or_default();
        for key in STRUCTURAL_KEYS {
            if extras.remove(*key).is_some() {
                tracing::debug!(key = %key, "Dropped extra that collides with a problem field");
            }
        }

        let document = Self {
            type_uri: type_uri.unwrap_or(DEFAULT_TYPE).to_string(),
            title: title.to_string(),
            status: status.as_u16(),
            detail: mask_detail(detail),
            correlation_id: Uuid::new_v4(),
            extras,
        };

        let logged_extras = Value::Object(redact_extras(&document.extras));
        tracing::error!(
            correlation_id = %document.correlation_id,
            status = document.status,
            title = %document.title,
            detail = %document.detail,
            problem_type = %document.type_uri,
            extras = %logged_extras,
            "API error"
        );

        document
    }

    /// Entry point for failures nobody classified. The full diagnostic goes
    /// to the server log only; the caller gets a fixed generic body.
    pub fn internal(diagnostic: &str) -> Self {
        let document = Self::build(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
            "An unexpected error occurred",
            None,
            None,
        );
        tracing::error!(
            correlation_id = %document.correlation_id,
            diagnostic = %diagnostic,
            backtrace = %std::backtrace::Backtrace::force_capture(),
            "Unhandled internal error"
        );
        document
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ProblemDocument {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, Json(self)).into_response();
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_masks_email_and_tokens() {
        let masked = mask_detail("Error with secret_token_12345 and user@example.com");
        assert_eq!(masked, "Error with [TOKEN] and [EMAIL]");
    }

    #[test]
    fn test_short_prefixed_identifier_kept() {
        assert_eq!(mask_detail("key_short"), "key_short");
        assert_eq!(mask_detail("api key_ABCDEFGHIJ"), "api [TOKEN]");
    }

    #[test]
    fn test_document_shape() {
        let doc = ProblemDocument::build(
            StatusCode::NOT_FOUND,
            "Not Found",
            "Media item not found",
            None,
            None,
        );
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["type"], "about:blank");
        assert_eq!(value["title"], "Not Found");
        assert_eq!(value["status"], 404);
        assert_eq!(value["detail"], "Media item not found");
        assert_eq!(value["correlation_id"].as_str().unwrap().len(), 36);
        assert_eq!(value.as_object().unwrap().len(), 5);
    }

    #[test]
    fn test_correlation_ids_are_unique() {
        let a = ProblemDocument::build(StatusCode::BAD_REQUEST, "A", "a", None, None);
        let b = ProblemDocument::build(StatusCode::BAD_REQUEST, "A", "a", None, None);
        assert_ne!(a.correlation_id, b.correlation_id);
    }

    #[test]
    fn test_extras_kept_in_body_but_redacted_for_log() {
        let mut extras = Map::new();
        extras.insert("errors".to_string(), json!([]));
        extras.insert("api_Key".to_string(), json!("abc"));
        extras.insert("status".to_string(), json!(999));

        let doc = ProblemDocument::build(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Validation Error",
            "bad",
            Some("https://example.com/problem"),
            Some(extras),
        );
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["status"], 422);
        assert_eq!(value["api_Key"], "abc");

        let logged = redact_extras(&doc.extras);
        assert!(logged.contains_key("errors"));
        assert!(!logged.contains_key("api_Key"));
    }

    #[test]
    fn test_internal_is_generic() {
        let doc = ProblemDocument::internal("connection to db failed for admin@example.com");
        assert_eq!(doc.status, 500);
        assert_eq!(doc.detail, "An unexpected error occurred");
        assert!(!doc.detail.contains("example.com"));
    }
}
