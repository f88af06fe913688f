use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Startup and plumbing failures. None of these are ever produced per request.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Closed taxonomy of per-request extraction failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    ValidationError,
    ProviderProcessingError,
    ProviderTransportError,
    ProviderAuthError,
    UnknownError,
}

impl ErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
            ErrorKind::ProviderProcessingError
            | ErrorKind::ProviderTransportError
            | ErrorKind::ProviderAuthError
            | ErrorKind::UnknownError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::ProviderProcessingError => "ProviderProcessingError",
            ErrorKind::ProviderTransportError => "ProviderTransportError",
            ErrorKind::ProviderAuthError => "ProviderAuthError",
            ErrorKind::UnknownError => "UnknownError",
        };
        f.write_str(name)
    }
}

pub const AUTH_FAILED_MESSAGE: &str = "The OCR provider rejected the configured credentials.";
pub const TRANSPORT_FAILED_MESSAGE: &str =
    "The OCR provider could not be reached. Please try again.";
pub const UNKNOWN_FAILURE_MESSAGE: &str = "An unexpected server error occurred.";

/// A classified extraction failure.
///
/// `message` is always safe to return to the caller. Anything provider-internal
/// lives in `provider_detail` and only ever reaches the server log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ExtractionError {
    pub kind: ErrorKind,
    pub message: String,
    pub provider_detail: Option<String>,
}

impl ExtractionError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::ValidationError,
            message: message.into(),
            provider_detail: None,
        }
    }

    /// The provider understood the request but could not extract text.
    /// Its own explanation is passed through to the caller.
    pub fn processing(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::ProviderProcessingError,
            message: message.into(),
            provider_detail: None,
        }
    }

    pub fn transport(detail: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::ProviderTransportError,
            message: TRANSPORT_FAILED_MESSAGE.to_string(),
            provider_detail: Some(detail.into()),
        }
    }

    pub fn auth(detail: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::ProviderAuthError,
            message: AUTH_FAILED_MESSAGE.to_string(),
            provider_detail: Some(detail.into()),
        }
    }

    pub fn unknown(detail: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::UnknownError,
            message: UNKNOWN_FAILURE_MESSAGE.to_string(),
            provider_detail: Some(detail.into()),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.provider_detail = Some(detail.into());
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.kind.status_code()
    }
}

impl IntoResponse for ExtractionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err = ExtractionError::validation("No image file found.");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_provider_kinds_map_to_internal_error() {
        for err in [
            ExtractionError::processing("bad image"),
            ExtractionError::transport("connection reset"),
            ExtractionError::auth("403"),
            ExtractionError::unknown("???"),
        ] {
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn test_generic_kinds_hide_provider_detail() {
        let err = ExtractionError::auth("apikey=sk-live-123 rejected");
        assert_eq!(err.message, AUTH_FAILED_MESSAGE);
        assert!(!err.message.contains("sk-live-123"));
        assert_eq!(err.provider_detail.as_deref(), Some("apikey=sk-live-123 rejected"));
    }

    #[tokio::test]
    async fn test_response_body_only_carries_error_message() {
        let response = ExtractionError::unknown("stack trace here").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json, json!({ "error": UNKNOWN_FAILURE_MESSAGE }));
    }
}
