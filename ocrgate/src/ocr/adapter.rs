use async_trait::async_trait;

use crate::error::ExtractionError;

use super::types::{ExtractionResult, ImageSubmission};

/// One OCR backend.
///
/// Implementations make exactly one outbound call per invocation and never
/// retry. Raw provider shapes stay private to the implementing module.
#[async_trait]
pub trait OcrAdapter: Send + Sync {
    /// Short backend name used in logs and the health endpoint.
    fn name(&self) -> &'static str;

    async fn extract_text(
        &self,
        submission: &ImageSubmission,
    ) -> Result<ExtractionResult, ExtractionError>;
}
