use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::Deserialize;
use tracing::debug;

use crate::config::OcrSpaceConfig;
use crate::error::{ExtractionError, GatewayError, Result};

use super::adapter::OcrAdapter;
use super::classify::{classify_http_failure, classify_in_band, classify_request_error};
use super::normalize;
use super::types::{ExtractionResult, ImageSubmission};

const PROVIDER: &str = "ocrspace";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorMessages {
    One(String),
    Many(Vec<String>),
}

impl ErrorMessages {
    fn into_vec(self) -> Vec<String> {
        match self {
            ErrorMessages::One(m) => vec![m],
            ErrorMessages::Many(m) => m,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParseResponse {
    #[serde(default)]
    parsed_results: Option<Vec<ParsedResult>>,
    #[serde(default)]
    is_errored_on_processing: bool,
    #[serde(default)]
    error_message: Option<ErrorMessages>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParsedResult {
    #[serde(default)]
    parsed_text: Option<String>,
}

/// OCR.space `parse/image` client.
#[derive(Clone, Debug)]
pub struct OcrSpaceClient {
    client: Client,
    api_key: String,
    base_url: String,
    language: String,
}

impl OcrSpaceClient {
    pub fn new(config: &OcrSpaceConfig, timeout: Duration) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| GatewayError::Config("OCR_SPACE_API_KEY is not set".to_string()))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            language: config.language.clone(),
        })
    }

    fn build_form(
        &self,
        submission: &ImageSubmission,
    ) -> std::result::Result<multipart::Form, ExtractionError> {
        let file_part = multipart::Part::bytes(submission.bytes().to_vec())
            .file_name(submission.filename().to_string())
            .mime_str(submission.mime_type())
            .map_err(|e| {
                ExtractionError::validation(format!(
                    "Unsupported content type '{}'",
                    submission.mime_type()
                ))
                .with_detail(e.to_string())
            })?;

        Ok(multipart::Form::new()
            .part("file", file_part)
            .text("language", self.language.clone())
            .text("isOverlayRequired", "false"))
    }
}

#[async_trait]
impl OcrAdapter for OcrSpaceClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn extract_text(
        &self,
        submission: &ImageSubmission,
    ) -> std::result::Result<ExtractionResult, ExtractionError> {
        let form = self.build_form(submission)?;
        let url = format!("{}/parse/image", self.base_url);

        debug!("Sending OCR request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| classify_request_error(PROVIDER, &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_request_error(PROVIDER, &e))?;

        if !status.is_success() {
            // OCR.space reports failures as plain text or as its normal envelope,
            // never as a structured code, so there is no fault to extract.
            return Err(classify_http_failure(PROVIDER, status, None, &body));
        }

        let parsed: ParseResponse = serde_json::from_str(&body).map_err(|e| {
            ExtractionError::unknown(format!("{PROVIDER}: unreadable response: {e}: {body}"))
        })?;

        if parsed.is_errored_on_processing {
            let messages = parsed
                .error_message
                .map(ErrorMessages::into_vec)
                .unwrap_or_default();
            return Err(classify_in_band(messages).with_detail(body));
        }

        Ok(normalize::from_parsed_results(
            parsed
                .parsed_results
                .unwrap_or_default()
                .into_iter()
                .map(|r| r.parsed_text),
        ))
    }
}
