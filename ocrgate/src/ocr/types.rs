use serde::{Deserialize, Serialize};

/// Returned in place of text when a provider successfully detects nothing.
pub const NO_TEXT_FOUND: &str = "No text found in image.";

/// One uploaded image, as handed over by the HTTP layer.
#[derive(Debug, Clone)]
pub struct ImageSubmission {
    bytes: Vec<u8>,
    filename: String,
    mime_type: String,
}

impl ImageSubmission {
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            filename: filename.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub text: String,
}

impl ExtractionResult {
    pub fn is_empty_sentinel(&self) -> bool {
        self.text == NO_TEXT_FOUND
    }
}
