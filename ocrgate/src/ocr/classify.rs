//! Maps provider failure shapes onto [`ExtractionError`] kinds.

use reqwest::StatusCode;

use crate::error::ExtractionError;

/// Structured error payload pulled out of a provider's error response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderFault {
    pub code: Option<String>,
    pub message: Option<String>,
}

const AUTH_CODES: &[&str] = &[
    "UNAUTHENTICATED",
    "PERMISSION_DENIED",
    "API_KEY_INVALID",
    "AccessDeniedException",
    "UnrecognizedClientException",
    "InvalidSignatureException",
    "ExpiredTokenException",
    "InvalidClientTokenId",
    "MissingAuthenticationTokenException",
    "IncompleteSignature",
];

const DOCUMENT_CODES: &[&str] = &[
    "BadDocumentException",
    "UnsupportedDocumentException",
    "DocumentTooLargeException",
    "InvalidParameterException",
];

const TRANSIENT_CODES: &[&str] = &[
    "ThrottlingException",
    "ProvisionedThroughputExceededException",
    "InternalServerError",
    "ServiceUnavailableException",
    "LimitExceededException",
];

const DEFAULT_PROCESSING_MESSAGE: &str = "The OCR provider could not process the image.";

pub fn is_auth_code(code: &str) -> bool {
    AUTH_CODES.iter().any(|c| c.eq_ignore_ascii_case(code))
}

/// An explicit "could not process" flag inside an otherwise successful response.
pub fn classify_in_band<I, S>(messages: I) -> ExtractionError
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = messages
        .into_iter()
        .map(|m| m.as_ref().trim().to_string())
        .filter(|m| !m.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    if joined.is_empty() {
        ExtractionError::processing(DEFAULT_PROCESSING_MESSAGE)
    } else {
        ExtractionError::processing(joined)
    }
}

/// The call never produced an HTTP response.
pub fn classify_request_error(provider: &str, err: &reqwest::Error) -> ExtractionError {
    if err.is_builder() || err.is_decode() {
        return ExtractionError::unknown(format!("{provider}: {err}"));
    }
    if err.is_timeout() {
        return ExtractionError::transport(format!("{provider}: request timed out: {err}"));
    }
    ExtractionError::transport(format!("{provider}: request failed: {err}"))
}

/// The provider answered with a non-success status.
pub fn classify_http_failure(
    provider: &str,
    status: StatusCode,
    fault: Option<ProviderFault>,
    body: &str,
) -> ExtractionError {
    let detail = format!("{provider}: HTTP {status}: {body}");

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return ExtractionError::auth(detail);
    }

    let Some(fault) = fault else {
        return ExtractionError::transport(detail);
    };

    if fault.code.as_deref().is_some_and(is_auth_code) {
        return ExtractionError::auth(detail);
    }

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return ExtractionError::transport(detail);
    }

    if status.is_client_error() {
        let message = fault
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PROCESSING_MESSAGE.to_string());
        return ExtractionError::processing(message).with_detail(detail);
    }

    ExtractionError::unknown(detail)
}

/// Service errors reported by code rather than by HTTP status (AWS style).
pub fn classify_service_code(
    provider: &str,
    code: Option<&str>,
    message: Option<&str>,
) -> ExtractionError {
    let detail = format!(
        "{provider}: {}: {}",
        code.unwrap_or("<no code>"),
        message.unwrap_or("<no message>")
    );

    match code {
        Some(c) if is_auth_code(c) => ExtractionError::auth(detail),
        Some(c) if DOCUMENT_CODES.contains(&c) => {
            let message = message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(DEFAULT_PROCESSING_MESSAGE);
            ExtractionError::processing(message).with_detail(detail)
        }
        Some(c) if TRANSIENT_CODES.contains(&c) => ExtractionError::transport(detail),
        _ => ExtractionError::unknown(detail),
    }
}
