//! OCR (Optical Character Recognition) Module
//!
//! Fronts three interchangeable remote OCR backends behind one contract.
//!
//! # Architecture
//!
//! - `OcrAdapter` trait: one outbound call per upload, no retries
//! - `OcrSpaceClient`: OCR.space multipart `parse/image`
//! - `VisionClient`: Google Cloud Vision `TEXT_DETECTION` (API key or service account)
//! - `TextractClient`: AWS Textract `DetectDocumentText`
//! - `normalize`: turns each provider's text shape into one trimmed string or the
//!   [`NO_TEXT_FOUND`] sentinel
//! - `classify`: maps provider failures onto [`ErrorKind`](crate::error::ErrorKind)
//! - `OcrProvider`: the facade the HTTP layer calls; owns the timeout
//!
//! # Configuration
//!
//! Backend selection and credentials come from `OcrConfig` (see `config.rs`):
//! - `provider`: `ocrspace`, `vision` or `textract`
//! - `timeout_secs`: bound applied to every backend
//! - per-backend credential and endpoint sections
//!
//! # Usage
//!
//! ```rust,ignore
//! let ocr = OcrProvider::new(&config.ocr).await?;
//! let result = ocr.handle_upload(Some(submission)).await?;
//! ```

mod adapter;
pub mod classify;
mod google_auth;
pub mod normalize;
mod ocr_space;
mod provider;
mod textract;
mod types;
mod vision;

pub use adapter::OcrAdapter;
pub use ocr_space::OcrSpaceClient;
pub use provider::{OcrProvider, NO_IMAGE_MESSAGE};
pub use textract::TextractClient;
pub use types::{ExtractionResult, ImageSubmission, NO_TEXT_FOUND};
pub use vision::VisionClient;
