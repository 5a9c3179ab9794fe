//! Error types for identity provider API calls.
//!
//! Every failure of an outbound call is categorised so the HTTP layer can
//! report it and logs carry the status and body the provider returned.

use thiserror::Error;

/// Result type alias for identity provider operations.
pub type Result<T> = std::result::Result<T, IdentityError>;

/// Failures talking to the identity provider's backend API.
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    /// Network-level connectivity failure.
    #[error("network connection failed: {message}")]
    Network {
        /// Error message describing the network failure
        message: String,
    },

    /// HTTP request timeout exceeded.
    #[error("request timeout after {timeout_seconds}s")]
    Timeout {
        /// Number of seconds before the request timed out
        timeout_seconds: u64,
    },

    /// HTTP response indicated client error (4xx).
    #[error("client error: HTTP {status_code}")]
    ClientError {
        /// HTTP status code (4xx)
        status_code: u16,
        /// Response body content
        body: String,
    },

    /// HTTP response indicated server error (5xx).
    #[error("server error: HTTP {status_code}")]
    ServerError {
        /// HTTP status code (5xx)
        status_code: u16,
        /// Response body content
        body: String,
    },

    /// Provider is throttling this API key.
    #[error("rate limited: retry after {retry_after_seconds}s")]
    RateLimited {
        /// Seconds the provider asked us to wait
        retry_after_seconds: u64,
    },

    /// Successful status but a body we could not decode.
    #[error("invalid response from identity provider: {message}")]
    InvalidResponse {
        /// Decode error message
        message: String,
    },

    /// Client could not be built from the given settings.
    #[error("invalid identity client configuration: {message}")]
    Configuration {
        /// Configuration error message
        message: String,
    },
}

impl IdentityError {
    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_seconds: u64) -> Self {
        Self::Timeout { timeout_seconds }
    }

    /// Creates a client error from HTTP response.
    pub fn client_error(status_code: u16, body: impl Into<String>) -> Self {
        Self::ClientError { status_code, body: body.into() }
    }

    /// Creates a server error from HTTP response.
    pub fn server_error(status_code: u16, body: impl Into<String>) -> Self {
        Self::ServerError { status_code, body: body.into() }
    }

    /// Creates a rate limit error.
    pub fn rate_limited(retry_after_seconds: u64) -> Self {
        Self::RateLimited { retry_after_seconds }
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse { message: message.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// HTTP status returned by the provider, when there was a response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ClientError { status_code, .. } | Self::ServerError { status_code, .. } => {
                Some(*status_code)
            },
            Self::RateLimited { .. } => Some(429),
            Self::Network { .. }
            | Self::Timeout { .. }
            | Self::InvalidResponse { .. }
            | Self::Configuration { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_reported_for_http_failures() {
        assert_eq!(IdentityError::client_error(404, "not found").status_code(), Some(404));
        assert_eq!(IdentityError::server_error(503, "unavailable").status_code(), Some(503));
        assert_eq!(IdentityError::rate_limited(10).status_code(), Some(429));
        assert_eq!(IdentityError::network("refused").status_code(), None);
        assert_eq!(IdentityError::timeout(10).status_code(), None);
    }

    #[test]
    fn error_display_format() {
        assert_eq!(IdentityError::timeout(10).to_string(), "request timeout after 10s");
        assert_eq!(
            IdentityError::client_error(422, "bad metadata").to_string(),
            "client error: HTTP 422"
        );
        assert_eq!(
            IdentityError::rate_limited(30).to_string(),
            "rate limited: retry after 30s"
        );
    }
}
