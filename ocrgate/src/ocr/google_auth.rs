//! Service-account OAuth for Google Cloud.
//!
//! Signs an RS256 JWT assertion with the account's private key and trades it
//! at `token_uri` for a short-lived bearer token. The token is cached until
//! shortly before it expires.

use std::path::Path;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ExtractionError, GatewayError, Result};

use super::classify::{classify_http_failure, classify_request_error};

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;
const PROVIDER: &str = "google-oauth";

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!(
                "Cannot read Google credentials file '{}': {e}",
                path.display()
            ))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            GatewayError::Config(format!(
                "Google credentials file '{}' is not a service-account key: {e}",
                path.display()
            ))
        })
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

pub struct TokenSource {
    client: Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(client: Client, key: ServiceAccountKey) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            GatewayError::Config(format!("Invalid service-account private key: {e}"))
        })?;

        Ok(Self {
            client,
            key,
            encoding_key,
            cached: RwLock::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    pub async fn access_token(&self) -> std::result::Result<String, ExtractionError> {
        let now = Utc::now();

        if let Some(token) = self.cached.read().await.as_ref() {
            if token.expires_at > now {
                return Ok(token.access_token.clone());
            }
        }

        let mut guard = self.cached.write().await;
        if let Some(token) = guard.as_ref() {
            if token.expires_at > now {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        let access_token = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(access_token)
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> std::result::Result<String, ExtractionError> {
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: &self.key.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key).map_err(|e| {
            ExtractionError::unknown(format!("{PROVIDER}: failed to sign assertion: {e}"))
        })
    }

    async fn fetch_token(&self) -> std::result::Result<CachedToken, ExtractionError> {
        let now = Utc::now();
        let assertion = self.sign_assertion(now)?;

        debug!(client_email = %self.key.client_email, "Requesting Google access token");

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| classify_request_error(PROVIDER, &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_request_error(PROVIDER, &e))?;

        if !status.is_success() {
            // invalid_grant and friends mean the key itself is unusable.
            if let Ok(err_body) = serde_json::from_str::<TokenErrorBody>(&body) {
                if err_body.error.is_some() {
                    return Err(ExtractionError::auth(format!(
                        "{PROVIDER}: HTTP {status}: {} {}",
                        err_body.error.unwrap_or_default(),
                        err_body.error_description.unwrap_or_default()
                    )));
                }
            }
            return Err(classify_http_failure(PROVIDER, status, None, &body));
        }

        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            ExtractionError::unknown(format!("{PROVIDER}: unreadable token response: {e}"))
        })?;

        let lifetime = token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
        let expires_at = now + ChronoDuration::seconds((lifetime - REFRESH_MARGIN_SECS).max(0));

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at,
        })
    }
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSource")
            .field("client_email", &self.key.client_email)
            .field("token_uri", &self.key.token_uri)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_credentials_file_is_config_error() {
        let result = ServiceAccountKey::from_file("/nonexistent/gcp-credentials.json");
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_token_uri_defaults_when_absent() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"client_email":"svc@example.iam.gserviceaccount.com","private_key":"---"}}"#
        )
        .unwrap();

        let key = ServiceAccountKey::from_file(file.path()).unwrap();
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
        assert_eq!(key.client_email, "svc@example.iam.gserviceaccount.com");
    }

    #[test]
    fn test_non_service_account_json_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"type":"authorized_user"}}"#).unwrap();
        assert!(matches!(
            ServiceAccountKey::from_file(file.path()),
            Err(GatewayError::Config(_))
        ));
    }

    #[test]
    fn test_garbage_private_key_is_rejected_at_startup() {
        let key = ServiceAccountKey {
            client_email: "svc@example.iam.gserviceaccount.com".to_string(),
            private_key: "not a pem".to_string(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
        };
        assert!(matches!(
            TokenSource::new(Client::new(), key),
            Err(GatewayError::Config(_))
        ));
    }
}
