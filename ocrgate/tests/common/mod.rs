#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

use ocrgate::api::AppState;
use ocrgate::config::{
    Config, OcrConfig, OcrSpaceConfig, ServerConfig, TextractConfig, VisionConfig,
    DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_UPLOAD_FIELD,
};
use ocrgate::error::ExtractionError;
use ocrgate::ocr::{ExtractionResult, ImageSubmission, OcrAdapter, OcrProvider};

pub const BOUNDARY: &str = "ocrgate-test-boundary";

/// Smallest thing that still looks like a JPEG to a content sniffer.
pub const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

/// Get the path to a fixture file
pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Config with every backend pointed at nothing and no credentials set.
pub fn test_config(provider: &str) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            upload_field: DEFAULT_UPLOAD_FIELD.to_string(),
        },
        ocr: OcrConfig {
            provider: provider.to_string(),
            timeout_secs: 5,
            max_image_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            ocr_space: OcrSpaceConfig::default(),
            vision: VisionConfig {
                credentials_path: None,
                ..VisionConfig::default()
            },
            textract: TextractConfig::default(),
        },
    }
}

/// Adapter double that counts calls and optionally stalls.
pub struct StubAdapter {
    calls: AtomicUsize,
    delay: Duration,
    text: String,
}

impl StubAdapter {
    pub fn returning(text: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            text: text.to_string(),
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            text: "too late".to_string(),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrAdapter for StubAdapter {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn extract_text(
        &self,
        _submission: &ImageSubmission,
    ) -> Result<ExtractionResult, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(ExtractionResult {
            text: self.text.clone(),
        })
    }
}

pub fn stub_state(adapter: Arc<StubAdapter>, timeout: Duration) -> AppState {
    let config = test_config("ocrspace");
    let ocr = OcrProvider::with_adapter(adapter, timeout, config.ocr.max_image_bytes);
    AppState::new(config, ocr)
}

pub async fn provider_state(config: Config) -> AppState {
    let ocr = OcrProvider::new(&config.ocr).await.unwrap();
    AppState::new(config, ocr)
}

/// Hand-rolled `multipart/form-data` body with a single file part.
pub fn multipart_body(field: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Multipart body carrying only a plain text field.
pub fn text_only_body(field: &str, value: &str) -> Vec<u8> {
    format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}\r\n--{BOUNDARY}--\r\n"
    )
    .into_bytes()
}

pub fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn jpeg_upload() -> Request<Body> {
    upload_request(multipart_body(
        DEFAULT_UPLOAD_FIELD,
        "hello.jpg",
        "image/jpeg",
        JPEG_BYTES,
    ))
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
