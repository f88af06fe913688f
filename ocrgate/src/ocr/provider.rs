use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::config::{OcrConfig, ProviderKind};
use crate::error::{ErrorKind, ExtractionError, Result};

use super::adapter::OcrAdapter;
use super::ocr_space::OcrSpaceClient;
use super::textract::TextractClient;
use super::types::{ExtractionResult, ImageSubmission};
use super::vision::VisionClient;

pub const NO_IMAGE_MESSAGE: &str = "No image file found.";

/// The single entry point the HTTP layer talks to.
///
/// Holds the one active adapter for the lifetime of the process and is
/// cheap to clone into request handlers.
#[derive(Clone)]
pub struct OcrProvider {
    adapter: Arc<dyn OcrAdapter>,
    timeout: Duration,
    max_image_bytes: usize,
}

impl OcrProvider {
    /// Builds the adapter selected by `config.provider`.
    ///
    /// Missing or unusable credentials are returned as
    /// [`GatewayError::Config`](crate::error::GatewayError::Config); the
    /// caller is expected to refuse to start.
    pub async fn new(config: &OcrConfig) -> Result<Self> {
        let kind = config.validate()?;
        let timeout = Duration::from_secs(config.timeout_secs);

        let adapter: Arc<dyn OcrAdapter> = match kind {
            ProviderKind::OcrSpace => Arc::new(OcrSpaceClient::new(&config.ocr_space, timeout)?),
            ProviderKind::Vision => Arc::new(VisionClient::new(&config.vision, timeout)?),
            ProviderKind::Textract => {
                Arc::new(TextractClient::new(&config.textract, timeout).await?)
            }
        };

        info!(
            provider = adapter.name(),
            timeout_secs = config.timeout_secs,
            "OCR provider initialized"
        );

        Ok(Self {
            adapter,
            timeout,
            max_image_bytes: config.max_image_bytes,
        })
    }

    pub fn with_adapter(
        adapter: Arc<dyn OcrAdapter>,
        timeout: Duration,
        max_image_bytes: usize,
    ) -> Self {
        Self {
            adapter,
            timeout,
            max_image_bytes,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.adapter.name()
    }

    /// Runs one upload through the active provider.
    ///
    /// `None` means the request carried no image field.
    pub async fn handle_upload(
        &self,
        submission: Option<ImageSubmission>,
    ) -> std::result::Result<ExtractionResult, ExtractionError> {
        let Some(submission) = submission else {
            warn!("Upload rejected: no image field");
            return Err(ExtractionError::validation(NO_IMAGE_MESSAGE));
        };

        let span = tracing::info_span!(
            "ocr",
            request_id = %Uuid::new_v4(),
            provider = self.adapter.name(),
        );

        self.extract(submission).instrument(span).await
    }

    async fn extract(
        &self,
        submission: ImageSubmission,
    ) -> std::result::Result<ExtractionResult, ExtractionError> {
        if submission.size_bytes() == 0 {
            warn!(filename = %submission.filename(), "Upload rejected: empty file");
            return Err(ExtractionError::validation("The uploaded image is empty."));
        }
        if submission.size_bytes() > self.max_image_bytes {
            warn!(
                filename = %submission.filename(),
                size = submission.size_bytes(),
                max = self.max_image_bytes,
                "Upload rejected: image too large"
            );
            return Err(ExtractionError::validation(format!(
                "The uploaded image exceeds the {} byte limit.",
                self.max_image_bytes
            )));
        }

        info!(
            filename = %submission.filename(),
            mime_type = %submission.mime_type(),
            size = submission.size_bytes(),
            "Sending image to OCR provider"
        );
        let started = Instant::now();

        let outcome =
            match tokio::time::timeout(self.timeout, self.adapter.extract_text(&submission)).await
            {
                Ok(inner) => inner,
                Err(_) => Err(ExtractionError::transport(format!(
                    "{}: no response within {} ms",
                    self.adapter.name(),
                    self.timeout.as_millis()
                ))),
            };

        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &outcome {
            Ok(result) => info!(
                elapsed_ms,
                chars = result.text.chars().count(),
                empty = result.is_empty_sentinel(),
                "Received OCR response"
            ),
            Err(err) if err.kind == ErrorKind::ValidationError => warn!(
                elapsed_ms,
                reason = %err.message,
                "OCR request rejected"
            ),
            Err(err) => error!(
                elapsed_ms,
                kind = %err.kind,
                detail = err.provider_detail.as_deref().unwrap_or(""),
                "OCR extraction failed"
            ),
        }

        outcome
    }
}
