//! Configuration management for the clerksync service.

use std::{fmt, net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use clerksync_identity::{ClientConfig, DEFAULT_API_URL};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::WebhookSettings;

const CONFIG_FILE: &str = "config.toml";

/// Environment variables read as configuration.
const ENV_KEYS: &[&str] = &[
    "DATABASE_URL",
    "DATABASE_MAX_CONNECTIONS",
    "DATABASE_MIN_CONNECTIONS",
    "DATABASE_CONNECTION_TIMEOUT",
    "DATABASE_IDLE_TIMEOUT",
    "DATABASE_MAX_LIFETIME",
    "HOST",
    "PORT",
    "REQUEST_TIMEOUT",
    "CLERK_SECRET_KEY",
    "CLERK_API_URL",
    "CLERK_TIMEOUT_SECONDS",
    "CLERK_WEBHOOK_SECRET",
    "WEBHOOK_TOLERANCE_SECONDS",
    "DEFAULT_ROLE",
    "RUST_LOG",
];

/// Complete service configuration with defaults, file, and environment
/// overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables (highest priority)
/// 2. Configuration file (`config.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// Everything except `CLERK_SECRET_KEY` has a working default.
///
/// # Example
///
/// ```no_run
/// use clerksync_api::Config;
///
/// let config = Config::load().expect("Failed to load configuration");
///
/// println!("Server will bind to {}:{}", config.host, config.port);
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    // Database
    /// PostgreSQL connection URL.
    ///
    /// Environment variable: `DATABASE_URL`
    #[serde(default = "default_database_url", alias = "DATABASE_URL")]
    pub database_url: String,
    /// Maximum number of database connections in the pool.
    ///
    /// Environment variable: `DATABASE_MAX_CONNECTIONS`
    #[serde(default = "default_max_connections", alias = "DATABASE_MAX_CONNECTIONS")]
    pub database_max_connections: u32,
    /// Minimum number of connections to maintain in the pool.
    ///
    /// Environment variable: `DATABASE_MIN_CONNECTIONS`
    #[serde(default = "default_min_connections", alias = "DATABASE_MIN_CONNECTIONS")]
    pub database_min_connections: u32,
    /// Database connection acquire timeout in seconds.
    ///
    /// Environment variable: `DATABASE_CONNECTION_TIMEOUT`
    #[serde(default = "default_acquire_timeout", alias = "DATABASE_CONNECTION_TIMEOUT")]
    pub database_connection_timeout: u64,
    /// Database connection idle timeout in seconds.
    ///
    /// Environment variable: `DATABASE_IDLE_TIMEOUT`
    #[serde(default = "default_idle_timeout", alias = "DATABASE_IDLE_TIMEOUT")]
    pub database_idle_timeout: u64,
    /// Maximum lifetime of database connections in seconds.
    ///
    /// Environment variable: `DATABASE_MAX_LIFETIME`
    #[serde(default = "default_max_lifetime", alias = "DATABASE_MAX_LIFETIME")]
    pub database_max_lifetime: u64,

    // Server
    /// Server bind address.
    ///
    /// Environment variable: `HOST`
    #[serde(default = "default_host", alias = "HOST")]
    pub host: String,
    /// Server bind port.
    ///
    /// Environment variable: `PORT`
    #[serde(default = "default_port", alias = "PORT")]
    pub port: u16,
    /// HTTP request timeout in seconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT`
    #[serde(default = "default_request_timeout", alias = "REQUEST_TIMEOUT")]
    pub request_timeout: u64,

    // Identity provider
    /// Backend API secret key.
    ///
    /// Environment variable: `CLERK_SECRET_KEY`
    #[serde(default, alias = "CLERK_SECRET_KEY")]
    pub clerk_secret_key: String,
    /// Backend API base URL.
    ///
    /// Environment variable: `CLERK_API_URL`
    #[serde(default = "default_clerk_api_url", alias = "CLERK_API_URL")]
    pub clerk_api_url: String,
    /// Timeout for identity provider calls in seconds.
    ///
    /// Environment variable: `CLERK_TIMEOUT_SECONDS`
    #[serde(default = "default_clerk_timeout", alias = "CLERK_TIMEOUT_SECONDS")]
    pub clerk_timeout_seconds: u64,

    // Webhook
    /// Svix signing secret (`whsec_...`). Signature checks are off when unset.
    ///
    /// Environment variable: `CLERK_WEBHOOK_SECRET`
    #[serde(default, alias = "CLERK_WEBHOOK_SECRET")]
    pub clerk_webhook_secret: Option<String>,
    /// Accepted clock skew for signed timestamps in seconds.
    ///
    /// Environment variable: `WEBHOOK_TOLERANCE_SECONDS`
    #[serde(default = "default_webhook_tolerance", alias = "WEBHOOK_TOLERANCE_SECONDS")]
    pub webhook_tolerance_seconds: u64,
    /// Role written to each new user's private metadata.
    ///
    /// Environment variable: `DEFAULT_ROLE`
    #[serde(default = "default_role", alias = "DEFAULT_ROLE")]
    pub default_role: String,

    // Logging
    /// Log level configuration.
    ///
    /// Environment variable: `RUST_LOG`
    #[serde(default = "default_log_level", alias = "RUST_LOG")]
    pub rust_log: String,
}

impl Config {
    /// Load configuration from defaults, config file, and environment variable
    /// overrides, then validate it.
    ///
    /// # Errors
    ///
    /// Fails when a source cannot be parsed or a value is out of range.
    pub fn load() -> Result<Self> {
        let config: Self = Self::figment().extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::raw().only(ENV_KEYS))
    }

    /// Convert to the identity client's configuration.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            api_url: self.clerk_api_url.clone(),
            secret_key: self.clerk_secret_key.clone(),
            timeout: Duration::from_secs(self.clerk_timeout_seconds),
            ..ClientConfig::default()
        }
    }

    /// Convert to webhook handling settings.
    ///
    /// An empty signing secret counts as unset.
    pub fn to_webhook_settings(&self) -> WebhookSettings {
        WebhookSettings {
            signing_secret: self.clerk_webhook_secret.clone().filter(|s| !s.trim().is_empty()),
            tolerance: Duration::from_secs(self.webhook_tolerance_seconds),
            default_role: self.default_role.clone(),
        }
    }

    /// Whole-request timeout applied by the router.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Parse server socket address from host and port configuration.
    ///
    /// # Errors
    ///
    /// Fails when `host` is not an IP address.
    pub fn parse_server_addr(&self) -> Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.host, self.port);
        SocketAddr::from_str(&addr_str).context("Invalid server address")
    }

    /// Get database URL with password masked for logging.
    pub fn database_url_masked(&self) -> String {
        if let Some(at_pos) = self.database_url.find('@') {
            if let Some(colon_pos) = self.database_url[..at_pos].rfind(':') {
                let mut masked = self.database_url.clone();
                masked.replace_range(colon_pos + 1..at_pos, "***");
                return masked;
            }
        }
        self.database_url.clone()
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }

        if self.database_max_connections == 0 {
            anyhow::bail!("database max_connections must be greater than 0");
        }

        if self.database_min_connections > self.database_max_connections {
            anyhow::bail!("database min_connections cannot exceed max_connections");
        }

        if self.request_timeout == 0 {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        if self.clerk_secret_key.trim().is_empty() {
            anyhow::bail!("CLERK_SECRET_KEY must be set");
        }

        if self.clerk_timeout_seconds == 0 {
            anyhow::bail!("clerk_timeout_seconds must be greater than 0");
        }

        if self.webhook_tolerance_seconds == 0 {
            anyhow::bail!("webhook_tolerance_seconds must be greater than 0");
        }

        if self.default_role.trim().is_empty() {
            anyhow::bail!("default_role must not be empty");
        }

        Ok(())
    }
}

fn mask_secret(secret: &str) -> String {
    match secret.len() {
        0 => String::new(),
        1..=8 => "***".to_string(),
        _ => {
            let visible = secret.find('_').map_or(3, |i| i + 1).min(8);
            format!("{}***", secret.get(..visible).unwrap_or_default())
        },
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &self.database_url_masked())
            .field("database_max_connections", &self.database_max_connections)
            .field("database_min_connections", &self.database_min_connections)
            .field("database_connection_timeout", &self.database_connection_timeout)
            .field("database_idle_timeout", &self.database_idle_timeout)
            .field("database_max_lifetime", &self.database_max_lifetime)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("request_timeout", &self.request_timeout)
            .field("clerk_secret_key", &mask_secret(&self.clerk_secret_key))
            .field("clerk_api_url", &self.clerk_api_url)
            .field("clerk_timeout_seconds", &self.clerk_timeout_seconds)
            .field("clerk_webhook_secret", &self.clerk_webhook_secret.as_deref().map(mask_secret))
            .field("webhook_tolerance_seconds", &self.webhook_tolerance_seconds)
            .field("default_role", &self.default_role)
            .field("rust_log", &self.rust_log)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            database_max_connections: default_max_connections(),
            database_min_connections: default_min_connections(),
            database_connection_timeout: default_acquire_timeout(),
            database_idle_timeout: default_idle_timeout(),
            database_max_lifetime: default_max_lifetime(),
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            clerk_secret_key: String::new(),
            clerk_api_url: default_clerk_api_url(),
            clerk_timeout_seconds: default_clerk_timeout(),
            clerk_webhook_secret: None,
            webhook_tolerance_seconds: default_webhook_tolerance(),
            default_role: default_role(),
            rust_log: default_log_level(),
        }
    }
}

fn default_database_url() -> String {
    "postgresql://localhost/clerksync".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

fn default_acquire_timeout() -> u64 {
    10
}

fn default_idle_timeout() -> u64 {
    600
}

fn default_max_lifetime() -> u64 {
    1800
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_clerk_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_clerk_timeout() -> u64 {
    clerksync_identity::DEFAULT_TIMEOUT_SECONDS
}

fn default_webhook_tolerance() -> u64 {
    crate::crypto::DEFAULT_TOLERANCE.as_secs()
}

fn default_role() -> String {
    crate::DEFAULT_ROLE.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
