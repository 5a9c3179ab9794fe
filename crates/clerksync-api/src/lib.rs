//! clerksync HTTP API.
//!
//! Receives `user.created` webhooks from the identity provider, mirrors the
//! user into the local store and tags the identity with its default role.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::{sync::Arc, time::Duration};

use clerksync_core::UserStore;
use clerksync_identity::ClerkClient;

pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod server;

pub use config::Config;
pub use error::WebhookError;
pub use server::{create_router, start_server};

/// Role written to private metadata when none is configured.
pub const DEFAULT_ROLE: &str = "guest";

/// Settings for verifying and processing inbound webhooks.
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    /// Svix signing secret. Verification is skipped when `None`.
    pub signing_secret: Option<String>,
    /// Accepted clock skew for signed timestamps.
    pub tolerance: Duration,
    /// Role merged into the private metadata of every new user.
    pub default_role: String,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            signing_secret: None,
            tolerance: crypto::DEFAULT_TOLERANCE,
            default_role: DEFAULT_ROLE.to_string(),
        }
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// User persistence.
    pub store: Arc<dyn UserStore>,
    /// Identity provider API client.
    pub identity: Arc<ClerkClient>,
    /// Webhook verification and processing settings.
    pub webhook: Arc<WebhookSettings>,
}

impl AppState {
    /// Creates application state from its parts.
    pub fn new(
        store: Arc<dyn UserStore>,
        identity: Arc<ClerkClient>,
        webhook: WebhookSettings,
    ) -> Self {
        Self { store, identity, webhook: Arc::new(webhook) }
    }
}
