use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use crate::api::state::AppState;
use crate::config::ServerConfig;
use crate::error::ExtractionError;
use crate::ocr::ImageSubmission;

const FALLBACK_FILENAME: &str = "upload";

fn payload_too_large(limit: usize) -> Response {
    (
        StatusCode::PAYLOAD_TOO_LARGE,
        Json(json!({
            "error": format!("The uploaded file exceeds the {limit} byte upload limit.")
        })),
    )
        .into_response()
}

fn reject_multipart(err: MultipartError, limit: usize) -> Response {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!(limit, "Upload rejected: body too large");
        return payload_too_large(limit);
    }
    warn!(error = %err.body_text(), "Upload rejected: malformed multipart body");
    ExtractionError::validation("Malformed multipart request.").into_response()
}

fn resolve_mime_type(content_type: Option<&str>, filename: &str) -> String {
    match content_type {
        Some(ct) if !ct.trim().is_empty() => ct.to_string(),
        _ => mime_guess::from_path(filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

/// Pulls the configured image field out of the form. Other fields are ignored.
async fn read_submission(
    mut multipart: Multipart,
    server: &ServerConfig,
) -> Result<Option<ImageSubmission>, Response> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(e) => return Err(reject_multipart(e, server.max_upload_bytes)),
        };

        if field.name() != Some(server.upload_field.as_str()) {
            continue;
        }

        let filename = field
            .file_name()
            .filter(|n| !n.is_empty())
            .unwrap_or(FALLBACK_FILENAME)
            .to_string();
        let mime_type = resolve_mime_type(field.content_type(), &filename);

        let bytes = field
            .bytes()
            .await
            .map_err(|e| reject_multipart(e, server.max_upload_bytes))?;

        if bytes.len() > server.max_upload_bytes {
            warn!(
                size = bytes.len(),
                limit = server.max_upload_bytes,
                "Upload rejected: file too large"
            );
            return Err(payload_too_large(server.max_upload_bytes));
        }

        return Ok(Some(ImageSubmission::new(bytes.to_vec(), filename, mime_type)));
    }
}

/// `POST /api/upload`
///
/// Accepts a multipart form with one image field and returns `{ "text": ... }`
/// or `{ "error": ... }`.
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let submission = match multipart {
        Ok(multipart) => match read_submission(multipart, &state.config.server).await {
            Ok(submission) => submission,
            Err(rejection) => return rejection,
        },
        Err(rejection) => {
            warn!(error = %rejection, "Upload is not a multipart request");
            None
        }
    };

    match state.ocr.handle_upload(submission).await {
        Ok(result) => Json(result).into_response(),
        Err(err) => err.into_response(),
    }
}
