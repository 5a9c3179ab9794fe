//! Test infrastructure for the clerksync webhook receiver.
//!
//! [`TestEnv`] wires the production router to an in-memory user store and a
//! wiremock server standing in for the identity provider, so request handling
//! can be exercised end to end without PostgreSQL or network access.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use clerksync_api::{
    crypto,
    server::{self, DEFAULT_REQUEST_TIMEOUT, WEBHOOK_PATH},
    AppState, WebhookSettings,
};
use clerksync_core::storage::mock::MockUserStore;
use clerksync_identity::{ClerkClient, ClientConfig};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

pub mod fixtures;

pub use fixtures::UserCreatedBuilder;

/// Signing secret used by [`TestEnvBuilder::with_signing_secret`].
pub const TEST_SIGNING_SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";

/// Secret key the mock identity provider expects.
pub const TEST_SECRET_KEY: &str = "sk_test_clerksync";

const METADATA_PATH: &str = r"^/v1/users/[^/]+/metadata$";

/// Builder for configuring a [`TestEnv`].
pub struct TestEnvBuilder {
    signing_secret: Option<String>,
    tolerance: Duration,
    default_role: String,
    client_timeout: Duration,
    request_timeout: Duration,
}

impl Default for TestEnvBuilder {
    fn default() -> Self {
        let settings = WebhookSettings::default();
        Self {
            signing_secret: settings.signing_secret,
            tolerance: settings.tolerance,
            default_role: settings.default_role,
            client_timeout: Duration::from_secs(5),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl TestEnvBuilder {
    /// Creates a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables signature verification with [`TEST_SIGNING_SECRET`].
    #[must_use]
    pub fn with_signing_secret(self) -> Self {
        self.signing_secret(TEST_SIGNING_SECRET)
    }

    /// Enables signature verification with the given secret.
    #[must_use]
    pub fn signing_secret(mut self, secret: impl Into<String>) -> Self {
        self.signing_secret = Some(secret.into());
        self
    }

    /// Sets the accepted timestamp skew (default: 300s).
    #[must_use]
    pub fn tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Sets the role written to private metadata (default: `guest`).
    #[must_use]
    pub fn default_role(mut self, role: impl Into<String>) -> Self {
        self.default_role = role.into();
        self
    }

    /// Sets the identity client timeout (default: 5s).
    #[must_use]
    pub fn client_timeout(mut self, timeout: Duration) -> Self {
        self.client_timeout = timeout;
        self
    }

    /// Sets the router's whole-request timeout (default: 30s).
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Starts the mock provider and assembles the router.
    ///
    /// # Errors
    ///
    /// Fails if the identity client cannot be built.
    pub async fn build(self) -> Result<TestEnv> {
        let identity_mock = MockServer::start().await;

        let client = ClerkClient::new(ClientConfig {
            api_url: format!("{}/v1", identity_mock.uri()),
            secret_key: TEST_SECRET_KEY.to_string(),
            timeout: self.client_timeout,
            ..ClientConfig::default()
        })
        .context("failed to build identity client")?;

        let store = MockUserStore::new();
        let settings = WebhookSettings {
            signing_secret: self.signing_secret,
            tolerance: self.tolerance,
            default_role: self.default_role,
        };

        let state = AppState::new(Arc::new(store.clone()), Arc::new(client), settings.clone());
        let router = server::create_router_with_timeout(state, self.request_timeout);

        Ok(TestEnv { store, identity_mock, router, settings })
    }
}

/// Test environment with an in-memory store and a mock identity provider.
pub struct TestEnv {
    /// In-memory user store backing the router.
    pub store: MockUserStore,
    /// Mock of the identity provider's backend API.
    pub identity_mock: MockServer,
    router: Router,
    settings: WebhookSettings,
}

/// Response captured from the router.
#[derive(Debug)]
pub struct TestResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw response body.
    pub body: Bytes,
}

impl TestResponse {
    /// Parses the body as JSON, returning `Value::Null` when it is not JSON.
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    /// Error code of a `{"error": {"code", ...}}` body.
    pub fn error_code(&self) -> Option<String> {
        self.json()["error"]["code"].as_str().map(str::to_string)
    }
}

impl TestEnv {
    /// Creates an environment without signature verification.
    ///
    /// # Errors
    ///
    /// Fails if the identity client cannot be built.
    pub async fn new() -> Result<Self> {
        TestEnvBuilder::new().build().await
    }

    /// Returns a builder for a customised environment.
    pub fn builder() -> TestEnvBuilder {
        TestEnvBuilder::new()
    }

    /// Webhook settings the router was built with.
    pub fn settings(&self) -> &WebhookSettings {
        &self.settings
    }

    /// Makes the provider accept every metadata update.
    pub async fn mock_metadata_success(&self) {
        Mock::given(matchers::method("PATCH"))
            .and(matchers::path_regex(METADATA_PATH))
            .and(matchers::header("authorization", format!("Bearer {TEST_SECRET_KEY}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "user_mock",
                "object": "user",
                "private_metadata": { "role": self.settings.default_role },
            })))
            .mount(&self.identity_mock)
            .await;
    }

    /// Makes the provider reject every metadata update with `status`.
    pub async fn mock_metadata_failure(&self, status: u16) {
        Mock::given(matchers::method("PATCH"))
            .and(matchers::path_regex(METADATA_PATH))
            .respond_with(
                ResponseTemplate::new(status).set_body_json(json!({
                    "errors": [{ "code": "mock_failure", "message": "mock failure" }]
                })),
            )
            .mount(&self.identity_mock)
            .await;
    }

    /// Metadata updates the provider received, as `(path, body)` pairs.
    pub async fn metadata_requests(&self) -> Vec<(String, Value)> {
        self.identity_mock
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.method.as_str() == "PATCH")
            .map(|request| {
                let body = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
                (request.url.path().to_string(), body)
            })
            .collect()
    }

    /// Posts an unsigned body to the webhook route.
    ///
    /// # Errors
    ///
    /// Fails if the request cannot be built or the body cannot be read.
    pub async fn post_webhook(&self, body: impl Into<Bytes>) -> Result<TestResponse> {
        self.post_webhook_with_headers(body, &[]).await
    }

    /// Posts a body signed with the environment's secret at the current time.
    ///
    /// # Errors
    ///
    /// Fails if no signing secret is configured or the request fails.
    pub async fn post_signed_webhook(&self, body: impl Into<Bytes>) -> Result<TestResponse> {
        let timestamp = chrono::Utc::now().timestamp();
        self.post_signed_webhook_at(body, timestamp).await
    }

    /// Posts a body signed with the environment's secret at `timestamp`.
    ///
    /// # Errors
    ///
    /// Fails if no signing secret is configured or the request fails.
    pub async fn post_signed_webhook_at(
        &self,
        body: impl Into<Bytes>,
        timestamp: i64,
    ) -> Result<TestResponse> {
        let secret =
            self.settings.signing_secret.as_deref().context("environment has no signing secret")?;
        let body = body.into();
        let msg_id = format!("msg_{}", Uuid::new_v4().simple());
        let signature = crypto::sign_payload(&msg_id, timestamp, &body, secret)
            .map_err(|e| anyhow::anyhow!("failed to sign payload: {e}"))?;
        let timestamp = timestamp.to_string();

        self.post_webhook_with_headers(body, &[
            ("svix-id", msg_id.as_str()),
            ("svix-timestamp", timestamp.as_str()),
            ("svix-signature", signature.as_str()),
        ])
        .await
    }

    /// Posts a body with extra headers to the webhook route.
    ///
    /// # Errors
    ///
    /// Fails if the request cannot be built or the body cannot be read.
    pub async fn post_webhook_with_headers(
        &self,
        body: impl Into<Bytes>,
        headers: &[(&str, &str)],
    ) -> Result<TestResponse> {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri(WEBHOOK_PATH)
            .header("content-type", "application/json");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        self.send(request.body(Body::from(body.into()))?).await
    }

    /// Issues a GET request against the router.
    ///
    /// # Errors
    ///
    /// Fails if the request cannot be built or the body cannot be read.
    pub async fn get(&self, path: &str) -> Result<TestResponse> {
        let request = Request::builder().method(Method::GET).uri(path).body(Body::empty())?;
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> Result<TestResponse> {
        let response = self.router.clone().oneshot(request).await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .context("failed to read response body")?;

        Ok(TestResponse { status, headers, body })
    }
}
