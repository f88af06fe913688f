use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_textract::config::retry::RetryConfig;
use aws_sdk_textract::config::timeout::TimeoutConfig;
use aws_sdk_textract::config::http::HttpResponse;
use aws_sdk_textract::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_textract::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_textract::operation::detect_document_text::DetectDocumentTextError;
use aws_sdk_textract::primitives::Blob;
use aws_sdk_textract::types::{Block, BlockType, Document};
use aws_sdk_textract::Client;
use tracing::debug;

use crate::config::TextractConfig;
use crate::error::{ErrorKind, ExtractionError, GatewayError, Result};

use super::adapter::OcrAdapter;
use super::classify::{classify_http_failure, classify_service_code};
use super::normalize::{self, BlockKind, DocumentBlock};
use super::types::{ExtractionResult, ImageSubmission};

const PROVIDER: &str = "textract";
const CREDENTIALS_SOURCE: &str = "ocrgate-config";

/// AWS Textract `DetectDocumentText` client.
#[derive(Clone, Debug)]
pub struct TextractClient {
    client: Client,
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| GatewayError::Config(format!("{name} is not set")))
}

impl TextractClient {
    /// Builds the SDK client from static credentials. SDK-level retries are
    /// turned off so one upload is one billed call.
    pub async fn new(config: &TextractConfig, timeout: Duration) -> Result<Self> {
        let access_key_id = required(&config.access_key_id, "AWS_ACCESS_KEY_ID")?;
        let secret_access_key = required(&config.secret_access_key, "AWS_SECRET_ACCESS_KEY")?;
        let region = required(&config.region, "AWS_REGION")?;

        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            CREDENTIALS_SOURCE,
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials)
            .retry_config(RetryConfig::disabled())
            .timeout_config(TimeoutConfig::builder().operation_timeout(timeout).build());
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        Ok(Self {
            client: Client::new(&sdk_config),
        })
    }
}

fn blocks_to_result(blocks: &[Block]) -> ExtractionResult {
    normalize::from_document_blocks(blocks.iter().map(|block| DocumentBlock {
        kind: match block.block_type() {
            Some(BlockType::Line) => BlockKind::Line,
            _ => BlockKind::Other,
        },
        text: block.text(),
    }))
}

/// A failed response that carried no error code, judged by status alone.
fn classify_unstructured(raw: &HttpResponse) -> ExtractionError {
    let status = raw.status().as_u16();
    let body = String::from_utf8_lossy(raw.body().bytes().unwrap_or_default());

    match reqwest::StatusCode::from_u16(status) {
        Ok(status) => classify_http_failure(PROVIDER, status, None, &body),
        Err(_) => ExtractionError::unknown(format!("{PROVIDER}: HTTP {status}: {body}")),
    }
}

fn classify_sdk_error(err: SdkError<DetectDocumentTextError, HttpResponse>) -> ExtractionError {
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            ExtractionError::transport(format!("{PROVIDER}: {}", DisplayErrorContext(&err)))
        }
        SdkError::ServiceError(ctx) => {
            let service_err = ctx.err();
            let Some(code) = service_err.code() else {
                return classify_unstructured(ctx.raw());
            };

            let classified = classify_service_code(PROVIDER, Some(code), service_err.message());
            let status = ctx.raw().status().as_u16();
            if classified.kind == ErrorKind::UnknownError && matches!(status, 401 | 403) {
                return ExtractionError::auth(format!("{PROVIDER}: HTTP {status}: {code}"));
            }
            classified
        }
        SdkError::ResponseError(ctx) => classify_unstructured(ctx.raw()),
        _ => ExtractionError::unknown(format!("{PROVIDER}: {}", DisplayErrorContext(&err))),
    }
}

#[async_trait]
impl OcrAdapter for TextractClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn extract_text(
        &self,
        submission: &ImageSubmission,
    ) -> std::result::Result<ExtractionResult, ExtractionError> {
        let document = Document::builder()
            .bytes(Blob::new(submission.bytes().to_vec()))
            .build();

        debug!(size = submission.size_bytes(), "Sending DetectDocumentText request");

        let output = self
            .client
            .detect_document_text()
            .document(document)
            .send()
            .await
            .map_err(classify_sdk_error)?;

        Ok(blocks_to_result(output.blocks()))
    }
}
