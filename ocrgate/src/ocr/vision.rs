use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::VisionConfig;
use crate::error::{ExtractionError, GatewayError, Result};

use super::adapter::OcrAdapter;
use super::classify::{
    classify_http_failure, classify_in_band, classify_request_error, is_auth_code, ProviderFault,
};
use super::google_auth::{ServiceAccountKey, TokenSource};
use super::normalize;
use super::types::{ExtractionResult, ImageSubmission};

const PROVIDER: &str = "vision";

#[derive(Debug, Serialize)]
struct AnnotateRequest<'a> {
    requests: [ImageRequest<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    image: ImageContent,
    features: [Feature<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Debug, Serialize)]
struct Feature<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    text_annotations: Vec<TextAnnotation>,
    #[serde(default)]
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    description: Option<String>,
}

/// `google.rpc.Status`, used both in-band and in HTTP error envelopes.
#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Status,
}

impl ErrorEnvelope {
    /// Prefers the machine-readable reason (e.g. `API_KEY_INVALID`) over the
    /// coarse status when Google supplies one.
    fn into_fault(self, body: &str) -> ProviderFault {
        let reason = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v["error"]["details"]
                    .as_array()?
                    .iter()
                    .find_map(|d| d["reason"].as_str().map(str::to_string))
            });

        ProviderFault {
            code: reason.or(self.error.status),
            message: self.error.message,
        }
    }
}

enum VisionAuth {
    ApiKey(String),
    ServiceAccount(TokenSource),
}

/// Google Cloud Vision `images:annotate` client using `TEXT_DETECTION`.
pub struct VisionClient {
    client: Client,
    auth: VisionAuth,
    base_url: String,
}

impl VisionClient {
    /// An API key wins over a credentials file when both are configured.
    pub fn new(config: &VisionConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        let auth = match (&config.api_key, &config.credentials_path) {
            (Some(key), _) => {
                info!("Using Google Vision API key authentication");
                VisionAuth::ApiKey(key.clone())
            }
            (None, Some(path)) => {
                let key = ServiceAccountKey::from_file(Path::new(path))?;
                let source = TokenSource::new(client.clone(), key)?;
                info!(
                    client_email = %source.client_email(),
                    "Using Google service-account authentication"
                );
                VisionAuth::ServiceAccount(source)
            }
            (None, None) => {
                return Err(GatewayError::Config(
                    "Neither GOOGLE_VISION_API_KEY nor GOOGLE_APPLICATION_CREDENTIALS is set"
                        .to_string(),
                ));
            }
        };

        Ok(Self {
            client,
            auth,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn annotate_body(submission: &ImageSubmission) -> AnnotateRequest<'static> {
        AnnotateRequest {
            requests: [ImageRequest {
                image: ImageContent {
                    content: STANDARD.encode(submission.bytes()),
                },
                features: [Feature {
                    kind: "TEXT_DETECTION",
                }],
            }],
        }
    }
}

#[async_trait]
impl OcrAdapter for VisionClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn extract_text(
        &self,
        submission: &ImageSubmission,
    ) -> std::result::Result<ExtractionResult, ExtractionError> {
        let url = format!("{}/v1/images:annotate", self.base_url);
        let mut request = self
            .client
            .post(&url)
            .json(&Self::annotate_body(submission));

        request = match &self.auth {
            VisionAuth::ApiKey(key) => request.query(&[("key", key)]),
            VisionAuth::ServiceAccount(source) => request.bearer_auth(source.access_token().await?),
        };

        debug!("Sending text detection request to {}", url);

        let response = request
            .send()
            .await
            .map_err(|e| classify_request_error(PROVIDER, &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_request_error(PROVIDER, &e))?;

        if !status.is_success() {
            let fault = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .map(|envelope| envelope.into_fault(&body));
            return Err(classify_http_failure(PROVIDER, status, fault, &body));
        }

        let parsed: AnnotateResponse = serde_json::from_str(&body).map_err(|e| {
            ExtractionError::unknown(format!("{PROVIDER}: unreadable response: {e}"))
        })?;

        let image = parsed.responses.into_iter().next().unwrap_or_default();

        if let Some(err) = image.error {
            let status = err.status.unwrap_or_default();
            let detail = format!("{PROVIDER}: in-band error {status}");
            if is_auth_code(&status) {
                return Err(ExtractionError::auth(detail));
            }
            return Err(classify_in_band(err.message).with_detail(detail));
        }

        Ok(normalize::from_text_annotations(
            image.text_annotations.into_iter().map(|a| a.description),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_VISION_BASE_URL;
    use crate::error::ErrorKind;
    use crate::ocr::types::NO_TEXT_FOUND;
    use serde_json::json;
    use wiremock::{
        matchers::{body_partial_json, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn api_key_config(base_url: &str) -> VisionConfig {
        VisionConfig {
            api_key: Some("vision-key".to_string()),
            credentials_path: None,
            base_url: base_url.to_string(),
        }
    }

    fn png() -> ImageSubmission {
        ImageSubmission::new(vec![0x89, b'P', b'N', b'G'], "scan.png", "image/png")
    }

    fn api_key_client(server: &MockServer) -> VisionClient {
        VisionClient::new(&api_key_config(&server.uri()), Duration::from_secs(5)).unwrap()
    }

    async fn mock_annotate(server: &MockServer, status: u16, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/v1/images:annotate"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_client_requires_some_credential() {
        let config = VisionConfig {
            api_key: None,
            credentials_path: None,
            base_url: DEFAULT_VISION_BASE_URL.to_string(),
        };
        assert!(matches!(
            VisionClient::new(&config, Duration::from_secs(30)),
            Err(GatewayError::Config(_))
        ));
    }

    #[test]
    fn test_missing_credentials_file_is_fatal() {
        let config = VisionConfig {
            api_key: None,
            credentials_path: Some("/nonexistent/gcp-credentials.json".to_string()),
            base_url: DEFAULT_VISION_BASE_URL.to_string(),
        };
        assert!(matches!(
            VisionClient::new(&config, Duration::from_secs(30)),
            Err(GatewayError::Config(_))
        ));
    }

    #[test]
    fn test_annotate_body_shape() {
        let body = serde_json::to_value(VisionClient::annotate_body(&png())).unwrap();
        assert_eq!(
            body,
            json!({
                "requests": [{
                    "image": { "content": "iVBORw==" },
                    "features": [{ "type": "TEXT_DETECTION" }]
                }]
            })
        );
    }

    #[tokio::test]
    async fn test_first_annotation_is_full_text() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/images:annotate"))
            .and(query_param("key", "vision-key"))
            .and(body_partial_json(json!({
                "requests": [{ "features": [{ "type": "TEXT_DETECTION" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "responses": [{
                    "textAnnotations": [
                        { "locale": "en", "description": "HELLO\nWORLD\n" },
                        { "description": "HELLO" },
                        { "description": "WORLD" }
                    ]
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = api_key_client(&server);
        let result = client.extract_text(&png()).await.unwrap();
        assert_eq!(result.text, "HELLO\nWORLD");
    }

    #[tokio::test]
    async fn test_empty_response_is_sentinel() {
        let server = MockServer::start().await;
        mock_annotate(&server, 200, json!({ "responses": [{}] })).await;

        let client = api_key_client(&server);
        let result = client.extract_text(&png()).await.unwrap();
        assert_eq!(result.text, NO_TEXT_FOUND);
    }

    #[tokio::test]
    async fn test_in_band_error_is_processing() {
        let server = MockServer::start().await;
        mock_annotate(
            &server,
            200,
            json!({
                "responses": [{
                    "error": { "code": 3, "status": "INVALID_ARGUMENT", "message": "Bad image data." }
                }]
            }),
        )
        .await;

        let client = api_key_client(&server);
        let err = client.extract_text(&png()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProviderProcessingError);
        assert_eq!(err.message, "Bad image data.");
    }

    #[tokio::test]
    async fn test_in_band_permission_denied_is_auth_error() {
        let server = MockServer::start().await;
        mock_annotate(
            &server,
            200,
            json!({
                "responses": [{
                    "error": {
                        "code": 7,
                        "status": "PERMISSION_DENIED",
                        "message": "This API method requires billing to be enabled."
                    }
                }]
            }),
        )
        .await;

        let err = api_key_client(&server).extract_text(&png()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProviderAuthError);
        assert!(!err.message.contains("billing"));
    }

    #[tokio::test]
    async fn test_invalid_api_key_is_auth_error() {
        let server = MockServer::start().await;
        mock_annotate(
            &server,
            400,
            json!({
                "error": {
                    "code": 400,
                    "message": "API key not valid. Please pass a valid API key.",
                    "status": "INVALID_ARGUMENT",
                    "details": [{
                        "@type": "type.googleapis.com/google.rpc.ErrorInfo",
                        "reason": "API_KEY_INVALID",
                        "domain": "googleapis.com"
                    }]
                }
            }),
        )
        .await;

        let client = api_key_client(&server);
        let err = client.extract_text(&png()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProviderAuthError);
        assert!(!err.message.contains("vision-key"));
    }

    #[tokio::test]
    async fn test_unstructured_gateway_error_is_transport() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/images:annotate"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let client = api_key_client(&server);
        let err = client.extract_text(&png()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProviderTransportError);
    }
}
