//! Request-level failures of the webhook receiver.
//!
//! Every failure maps to an error code, an HTTP status and a JSON body of the
//! form `{"error": {"code": "E1001", "message": "..."}}`.

use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use clerksync_core::CoreError;
use clerksync_identity::IdentityError;
use serde::Serialize;
use thiserror::Error;

use crate::handlers::webhook::MAX_PAYLOAD_SIZE;

/// Failures of a webhook request.
#[derive(Debug, Clone, Error)]
pub enum WebhookError {
    /// Signature missing, malformed, stale or not matching.
    #[error("Invalid token")]
    InvalidToken,

    /// Event data carries no provider user id.
    #[error("No ID in Request")]
    MissingId,

    /// Event type other than `user.created`.
    #[error("Unsupported event type: {event_type}")]
    UnsupportedEvent {
        /// Received type, or `<none>` when absent.
        event_type: String,
    },

    /// Body is not a valid user event.
    #[error("Invalid payload: {message}")]
    InvalidPayload {
        /// Decode error.
        message: String,
    },

    /// Body exceeds the accepted size.
    #[error("Payload exceeds {limit_bytes} bytes")]
    PayloadTooLarge {
        /// Accepted body size.
        limit_bytes: usize,
    },

    /// Storing the user failed. The driver error is logged, not returned.
    #[error("Database error")]
    Database(#[from] CoreError),

    /// Identity provider call failed.
    #[error("Identity provider error: {0}")]
    IdentityProvider(#[from] IdentityError),
}

impl WebhookError {
    /// Error code from the service taxonomy.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidToken => "E1001",
            Self::MissingId => "E1002",
            Self::UnsupportedEvent { .. } => "E1003",
            Self::InvalidPayload { .. } => "E1004",
            Self::PayloadTooLarge { .. } => "E1005",
            Self::IdentityProvider(_) => "E2001",
            Self::Database(_) => "E3001",
        }
    }

    /// HTTP status returned for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::MissingId | Self::UnsupportedEvent { .. } | Self::InvalidPayload { .. } => {
                StatusCode::BAD_REQUEST
            },
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IdentityProvider(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<BytesRejection> for WebhookError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge { limit_bytes: MAX_PAYLOAD_SIZE }
        } else {
            Self::InvalidPayload { message: rejection.body_text() }
        }
    }
}

/// Error response with code and message.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error details including code and message
    pub error: ErrorDetail,
}

/// Detailed error information.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code from our taxonomy (E1001-E3001)
    pub code: String,
    /// Human-readable error description
    pub message: String,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorDetail { code: self.code().to_string(), message: self.to_string() },
        };

        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_statuses() {
        let cases = [
            (WebhookError::InvalidToken, "E1001", StatusCode::UNAUTHORIZED),
            (WebhookError::MissingId, "E1002", StatusCode::BAD_REQUEST),
            (
                WebhookError::UnsupportedEvent { event_type: "user.deleted".into() },
                "E1003",
                StatusCode::BAD_REQUEST,
            ),
            (
                WebhookError::InvalidPayload { message: "eof".into() },
                "E1004",
                StatusCode::BAD_REQUEST,
            ),
            (
                WebhookError::PayloadTooLarge { limit_bytes: MAX_PAYLOAD_SIZE },
                "E1005",
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                WebhookError::Database(CoreError::Database("down".into())),
                "E3001",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                WebhookError::IdentityProvider(IdentityError::server_error(500, "")),
                "E2001",
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (error, code, status) in cases {
            assert_eq!(error.code(), code, "{error}");
            assert_eq!(error.status_code(), status, "{error}");
        }
    }

    #[test]
    fn named_messages_are_stable() {
        assert_eq!(WebhookError::InvalidToken.to_string(), "Invalid token");
        assert_eq!(WebhookError::MissingId.to_string(), "No ID in Request");
    }

    #[test]
    fn database_message_hides_driver_error() {
        let error = WebhookError::Database(CoreError::Database("connection reset".into()));

        assert_eq!(error.to_string(), "Database error");
        assert_eq!(
            std::error::Error::source(&error).map(ToString::to_string).as_deref(),
            Some("Database error: connection reset")
        );
    }

    #[test]
    fn error_response_uses_status() {
        let response = WebhookError::MissingId.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
