use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{GatewayError, Result};

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_UPLOAD_FIELD: &str = "imageFile";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_OCR_SPACE_BASE_URL: &str = "https://api.ocr.space";
pub const DEFAULT_VISION_BASE_URL: &str = "https://vision.googleapis.com";
pub const DEFAULT_GOOGLE_CREDENTIALS_PATH: &str = "./gcp-credentials.json";

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

/// Reads an optional string variable, treating blank values as unset.
fn env_opt(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub ocr: OcrConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    /// Multipart field that carries the image.
    pub upload_field: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    /// Active backend name, see [`ProviderKind`] for accepted spellings.
    pub provider: String,
    /// Upper bound for one provider call, applied to every backend.
    pub timeout_secs: u64,
    pub max_image_bytes: usize,
    pub ocr_space: OcrSpaceConfig,
    pub vision: VisionConfig,
    pub textract: TextractConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrSpaceConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Recognition language sent with every request (ISO 639-2).
    pub language: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisionConfig {
    pub api_key: Option<String>,
    pub credentials_path: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextractConfig {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
}

/// The OCR backends the gateway can front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OcrSpace,
    Vision,
    Textract,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OcrSpace => "ocrspace",
            ProviderKind::Vision => "vision",
            ProviderKind::Textract => "textract",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ocrspace" | "ocr.space" | "ocr_space" | "ocr-space" => Ok(ProviderKind::OcrSpace),
            "vision" | "google" | "google-vision" | "gcp" => Ok(ProviderKind::Vision),
            "textract" | "aws" | "aws-textract" => Ok(ProviderKind::Textract),
            other => Err(GatewayError::Config(format!(
                "Unknown OCR provider '{other}' (expected one of: ocrspace, vision, textract)"
            ))),
        }
    }
}

impl Default for OcrSpaceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_OCR_SPACE_BASE_URL.to_string(),
            language: "eng".to_string(),
        }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            credentials_path: None,
            base_url: DEFAULT_VISION_BASE_URL.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let max_upload_bytes = parse_env_or("OCRGATE_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES);

        Self {
            server: ServerConfig {
                host: env::var("OCRGATE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("OCRGATE_PORT", 3001),
                max_upload_bytes,
                upload_field: env::var("OCRGATE_UPLOAD_FIELD")
                    .unwrap_or_else(|_| DEFAULT_UPLOAD_FIELD.to_string()),
            },
            ocr: OcrConfig {
                provider: env::var("OCR_PROVIDER").unwrap_or_else(|_| "vision".to_string()),
                timeout_secs: parse_env_or("OCR_TIMEOUT", DEFAULT_TIMEOUT_SECS),
                max_image_bytes: max_upload_bytes,
                ocr_space: OcrSpaceConfig {
                    api_key: env_opt("OCR_SPACE_API_KEY"),
                    base_url: env::var("OCR_SPACE_BASE_URL")
                        .unwrap_or_else(|_| DEFAULT_OCR_SPACE_BASE_URL.to_string()),
                    language: env::var("OCR_LANGUAGE").unwrap_or_else(|_| "eng".to_string()),
                },
                vision: VisionConfig {
                    api_key: env_opt("GOOGLE_VISION_API_KEY"),
                    credentials_path: Some(
                        env_opt("GOOGLE_APPLICATION_CREDENTIALS")
                            .unwrap_or_else(|| DEFAULT_GOOGLE_CREDENTIALS_PATH.to_string()),
                    ),
                    base_url: env::var("VISION_BASE_URL")
                        .unwrap_or_else(|_| DEFAULT_VISION_BASE_URL.to_string()),
                },
                textract: TextractConfig {
                    access_key_id: env_opt("AWS_ACCESS_KEY_ID"),
                    secret_access_key: env_opt("AWS_SECRET_ACCESS_KEY"),
                    region: env_opt("AWS_REGION"),
                    endpoint_url: env_opt("TEXTRACT_ENDPOINT_URL"),
                },
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Checks everything the selected backend needs before the listener binds.
    pub fn validate(&self) -> Result<ProviderKind> {
        if self.server.max_upload_bytes == 0 {
            return Err(GatewayError::Config(
                "OCRGATE_MAX_UPLOAD_BYTES must be greater than zero".to_string(),
            ));
        }
        self.ocr.validate()
    }
}

impl OcrConfig {
    pub fn provider_kind(&self) -> Result<ProviderKind> {
        self.provider.parse()
    }

    pub fn validate(&self) -> Result<ProviderKind> {
        let kind = self.provider_kind()?;

        if self.timeout_secs == 0 {
            return Err(GatewayError::Config(
                "OCR_TIMEOUT must be at least 1 second".to_string(),
            ));
        }

        match kind {
            ProviderKind::OcrSpace => {
                if self.ocr_space.api_key.is_none() {
                    return Err(GatewayError::Config(
                        "OCR_SPACE_API_KEY is not set".to_string(),
                    ));
                }
            }
            ProviderKind::Vision => {
                if self.vision.api_key.is_none() {
                    match self.vision.credentials_path.as_deref() {
                        Some(path) if Path::new(path).is_file() => {}
                        Some(path) => {
                            return Err(GatewayError::Config(format!(
                                "Google credentials file not found at '{path}' and GOOGLE_VISION_API_KEY is not set"
                            )));
                        }
                        None => {
                            return Err(GatewayError::Config(
                                "Neither GOOGLE_VISION_API_KEY nor GOOGLE_APPLICATION_CREDENTIALS is set"
                                    .to_string(),
                            ));
                        }
                    }
                }
            }
            ProviderKind::Textract => {
                let missing: Vec<&str> = [
                    ("AWS_ACCESS_KEY_ID", self.textract.access_key_id.is_none()),
                    ("AWS_SECRET_ACCESS_KEY", self.textract.secret_access_key.is_none()),
                    ("AWS_REGION", self.textract.region.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();

                if !missing.is_empty() {
                    return Err(GatewayError::Config(format!(
                        "Missing Textract credentials: {}",
                        missing.join(", ")
                    )));
                }
            }
        }

        Ok(kind)
    }
}
