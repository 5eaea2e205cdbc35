//! Error types for the docconv library.
//!
//! Two distinct error types reflect two distinct audiences:
//!
//! * [`ConvertError`]: raised while a job runs (download, backend, upload).
//!   The orchestrator flattens these into the `error` string of the callback
//!   payload. Only [`ConvertError::UnknownTrack`] surfaces synchronously, as
//!   a 422 during request validation.
//!
//! * [`ApiError`]: rejections of the submission request itself (bad secret,
//!   unparseable body). These are the only failures a submitting client sees.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Maximum characters of an error message carried in a callback payload.
pub const MAX_ERROR_CHARS: usize = 1000;

/// Maximum characters of a converter's stderr carried in a [`ConvertError::Conversion`].
pub const MAX_STDERR_CHARS: usize = 1000;

/// Maximum characters of an upload response body carried in a [`ConvertError::Upload`].
pub const MAX_UPLOAD_BODY_CHARS: usize = 500;

/// All errors raised while converting and delivering one job.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The source document could not be fetched.
    #[error("Download failed for '{url}': {reason}")]
    Download { url: String, reason: String },

    /// The resolved backend cannot read this source type.
    #[error("{track} track does not support source_type: {source_type}")]
    UnsupportedSourceType { track: String, source_type: String },

    /// The request named a track this service does not know.
    #[error("Unknown track: {0}")]
    UnknownTrack(String),

    // ── Backend errors ────────────────────────────────────────────────────
    /// Deployment defect: the service is configured in a way that can never work.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The backend's engine or binary is not available on this host.
    #[error("Backend '{backend}' is unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    /// The backend ran but failed on this document.
    #[error("Conversion failed: {0}")]
    Conversion(String),

    // ── Delivery errors ───────────────────────────────────────────────────
    /// A pre-signed upload returned a non-success status or never completed.
    ///
    /// `status` is `None` when no HTTP response was received at all.
    #[error("Upload failed: {detail}")]
    Upload { status: Option<u16>, detail: String },

    /// The callback could not be delivered.
    #[error("Callback to '{url}' failed: {reason}")]
    Callback { url: String, reason: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (temp files, task joins).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Render the error for the callback payload, capped at [`MAX_ERROR_CHARS`].
    pub fn to_callback_message(&self) -> String {
        truncate_chars(&self.to_string(), MAX_ERROR_CHARS)
    }
}

/// Truncate `s` to at most `max` characters without splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Rejections returned synchronously by the submission endpoint.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Shared-secret header missing or wrong.
    #[error("Unauthorized")]
    Unauthorized,

    /// Authenticated request whose body does not describe a valid job.
    #[error("{0}")]
    Validation(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        let body = serde_json::json!({ "detail": self.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Job construction fails only on request content, so every error is a 422.
impl From<ConvertError> for ApiError {
    fn from(err: ConvertError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_source_type_names_the_type() {
        let e = ConvertError::UnsupportedSourceType {
            track: "pandoc".into(),
            source_type: "pdf".into(),
        };
        assert_eq!(e.to_string(), "pandoc track does not support source_type: pdf");
    }

    #[test]
    fn upload_display_carries_status() {
        let e = ConvertError::Upload {
            status: Some(403),
            detail: "HTTP 403 expired".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("HTTP 403"), "got: {msg}");
        assert!(msg.contains("expired"));
    }

    #[test]
    fn callback_message_is_capped() {
        let e = ConvertError::Conversion("x".repeat(5000));
        assert_eq!(e.to_callback_message().chars().count(), MAX_ERROR_CHARS);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn api_error_status_codes() {
        assert_eq!(
            ApiError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Validation("bad".into()).into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn job_construction_errors_are_unprocessable() {
        let unknown = ApiError::from(ConvertError::UnknownTrack("ocr".into()));
        assert_eq!(unknown.to_string(), "Unknown track: ocr");
        assert_eq!(
            unknown.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
