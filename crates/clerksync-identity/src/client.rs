//! HTTP client for the identity provider's backend API.
//!
//! Wraps the single call this service makes: merging keys into a user's
//! private metadata. Responses are categorised into [`IdentityError`] variants
//! so callers can tell throttling, auth problems and provider outages apart.

use std::{fmt, time::Duration};

use reqwest::{header::HeaderMap, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{info_span, Instrument};

use crate::error::{IdentityError, Result};

/// Default base URL of the provider's backend API.
pub const DEFAULT_API_URL: &str = "https://api.clerk.com/v1";

const MAX_ERROR_BODY_SIZE: usize = 1024;

/// Configuration for the identity provider client.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the backend API, e.g. `https://api.clerk.com/v1`.
    pub api_url: String,
    /// Backend secret key sent as a bearer token.
    pub secret_key: String,
    /// Timeout for a single request.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            secret_key: String::new(),
            timeout: Duration::from_secs(crate::DEFAULT_TIMEOUT_SECONDS),
            user_agent: concat!("clerksync/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url)
            .field("secret_key", &"***")
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// The subset of the provider's user object this service reads back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClerkUser {
    /// Provider user id.
    pub id: String,
    /// Private metadata after the update was applied.
    #[serde(default)]
    pub private_metadata: serde_json::Value,
}

#[derive(Serialize)]
struct MetadataUpdate<'a> {
    private_metadata: &'a serde_json::Value,
}

/// Client for the identity provider's backend API.
#[derive(Debug, Clone)]
pub struct ClerkClient {
    client: reqwest::Client,
    api_url: Url,
    config: ClientConfig,
}

impl ClerkClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Configuration` if the API URL is invalid or the
    /// HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let api_url = Url::parse(&config.api_url).map_err(|e| {
            IdentityError::configuration(format!("invalid api url {}: {e}", config.api_url))
        })?;
        if api_url.cannot_be_a_base() {
            return Err(IdentityError::configuration(format!(
                "api url {} cannot be used as a base",
                config.api_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                IdentityError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, api_url, config })
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Merges `metadata` into the user's private metadata.
    ///
    /// Issues `PATCH {api_url}/users/{user_id}/metadata`. Keys not present in
    /// `metadata` are left untouched by the provider.
    ///
    /// # Errors
    ///
    /// - `Network` / `Timeout` when the request does not complete
    /// - `RateLimited` for 429 responses
    /// - `ClientError` for other 4xx responses (bad key, unknown user)
    /// - `ServerError` for 5xx responses
    /// - `InvalidResponse` when a 2xx body cannot be decoded
    pub async fn update_private_metadata(
        &self,
        user_id: &str,
        metadata: &serde_json::Value,
    ) -> Result<ClerkUser> {
        let url = self.metadata_url(user_id)?;
        let span = info_span!("identity_update_metadata", user_id = %user_id);

        async move {
            let start_time = std::time::Instant::now();
            tracing::debug!(url = %url, "Updating private metadata");

            let response = self
                .client
                .patch(url)
                .bearer_auth(&self.config.secret_key)
                .json(&MetadataUpdate { private_metadata: metadata })
                .send()
                .await
                .map_err(|e| {
                    tracing::warn!(
                        duration_ms = start_time.elapsed().as_millis(),
                        "Request failed: {}",
                        e
                    );
                    if e.is_timeout() {
                        IdentityError::timeout(self.config.timeout.as_secs())
                    } else if e.is_connect() {
                        IdentityError::network(format!("connection failed: {e}"))
                    } else {
                        IdentityError::network(e.to_string())
                    }
                })?;

            let status = response.status();
            tracing::debug!(
                status = status.as_u16(),
                duration_ms = start_time.elapsed().as_millis(),
                "Received response"
            );

            if status.is_success() {
                let user = response
                    .json::<ClerkUser>()
                    .await
                    .map_err(|e| IdentityError::invalid_response(e.to_string()))?;
                tracing::info!("Private metadata updated");
                return Ok(user);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = extract_retry_after_seconds(response.headers());
                tracing::warn!(retry_after_seconds = retry_after, "Identity provider rate limit");
                return Err(IdentityError::rate_limited(retry_after));
            }

            let body = read_error_body(response).await;
            if status.is_server_error() {
                tracing::warn!(status = status.as_u16(), "Server error response");
                Err(IdentityError::server_error(status.as_u16(), body))
            } else {
                tracing::warn!(status = status.as_u16(), "Client error response");
                Err(IdentityError::client_error(status.as_u16(), body))
            }
        }
        .instrument(span)
        .await
    }

    fn metadata_url(&self, user_id: &str) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| IdentityError::configuration("api url cannot be used as a base"))?
            .pop_if_empty()
            .extend(["users", user_id, "metadata"]);
        Ok(url)
    }
}

/// Reads an error body, truncated for logging and error values.
async fn read_error_body(response: reqwest::Response) -> String {
    match response.bytes().await {
        Ok(bytes) if bytes.len() > MAX_ERROR_BODY_SIZE => {
            let suffix = "... (truncated)";
            let truncated = String::from_utf8_lossy(&bytes[..MAX_ERROR_BODY_SIZE - suffix.len()]);
            format!("{truncated}{suffix}")
        },
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            tracing::warn!("Failed to read response body: {}", e);
            format!("[Failed to read response body: {e}]")
        },
    }
}

/// Extracts the retry-after delay from response headers.
///
/// Supports both seconds and HTTP-date formats, defaulting to 60 seconds when
/// the header is missing or unparseable.
pub fn extract_retry_after_seconds(headers: &HeaderMap) -> u64 {
    const DEFAULT_RETRY_AFTER: u64 = 60;

    let Some(retry_after) = headers.get("retry-after").and_then(|v| v.to_str().ok()) else {
        return DEFAULT_RETRY_AFTER;
    };

    if let Ok(seconds) = retry_after.trim().parse::<u64>() {
        return seconds;
    }

    chrono::DateTime::parse_from_rfc2822(retry_after)
        .ok()
        .and_then(|date| date.with_timezone(&chrono::Utc).signed_duration_since(chrono::Utc::now()).to_std().ok())
        .map_or(DEFAULT_RETRY_AFTER, |delay| delay.as_secs())
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;
    use serde_json::json;
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> ClerkClient {
        ClerkClient::new(ClientConfig {
            api_url: format!("{}/v1", server.uri()),
            secret_key: "sk_test_123".to_string(),
            ..ClientConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn metadata_update_sends_bearer_and_body() {
        let server = MockServer::start().await;

        Mock::given(matchers::method("PATCH"))
            .and(matchers::path("/v1/users/user_123/metadata"))
            .and(matchers::header("authorization", "Bearer sk_test_123"))
            .and(matchers::body_json(json!({"private_metadata": {"role": "guest"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "user_123",
                "object": "user",
                "private_metadata": {"role": "guest"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let user = client_for(&server)
            .update_private_metadata("user_123", &json!({"role": "guest"}))
            .await
            .unwrap();

        assert_eq!(user.id, "user_123");
        assert_eq!(user.private_metadata["role"], "guest");
    }

    #[tokio::test]
    async fn unknown_user_is_client_error() {
        let server = MockServer::start().await;

        Mock::given(matchers::method("PATCH"))
            .respond_with(ResponseTemplate::new(404).set_body_string("resource_not_found"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .update_private_metadata("user_missing", &json!({"role": "guest"}))
            .await
            .unwrap_err();

        match err {
            IdentityError::ClientError { status_code, body } => {
                assert_eq!(status_code, 404);
                assert_eq!(body, "resource_not_found");
            },
            other => panic!("expected client error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn undecodable_success_body_is_invalid_response() {
        let server = MockServer::start().await;

        Mock::given(matchers::method("PATCH"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .update_private_metadata("user_123", &json!({"role": "guest"}))
            .await
            .unwrap_err();

        assert!(matches!(err, IdentityError::InvalidResponse { .. }));
    }

    #[test]
    fn metadata_url_appends_segments() {
        let client = ClerkClient::new(ClientConfig {
            api_url: "https://api.example.com/v1/".to_string(),
            ..ClientConfig::default()
        })
        .unwrap();

        let url = client.metadata_url("user_abc").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/users/user_abc/metadata");
    }

    #[test]
    fn invalid_api_url_is_configuration_error() {
        let err = ClerkClient::new(ClientConfig {
            api_url: "not a url".to_string(),
            ..ClientConfig::default()
        })
        .unwrap_err();

        assert!(matches!(err, IdentityError::Configuration { .. }));
    }

    #[test]
    fn config_debug_masks_secret() {
        let config = ClientConfig { secret_key: "sk_live_secret".to_string(), ..Default::default() };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk_live_secret"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn retry_after_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_retry_after_seconds(&headers), 60);

        headers.insert("retry-after", HeaderValue::from_static("120"));
        assert_eq!(extract_retry_after_seconds(&headers), 120);

        headers.insert("retry-after", HeaderValue::from_static("invalid"));
        assert_eq!(extract_retry_after_seconds(&headers), 60);
    }
}
