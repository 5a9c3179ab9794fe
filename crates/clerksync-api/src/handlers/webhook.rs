//! Identity provider webhook receiver.
//!
//! Verifies the delivery, mirrors the new user into the local store and then
//! asks the provider to record the default role in the user's private
//! metadata. The two writes are sequential and not transactional: a failed
//! provider call leaves the stored row in place.

use axum::{
    extract::{rejection::BytesRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use clerksync_core::{WebhookEvent, USER_CREATED};
use serde::Serialize;
use tracing::{debug, error, field, info, instrument, warn, Span};

use crate::{crypto, error::WebhookError, AppState};

/// Largest accepted webhook body. Enforced by the route's body limit layer.
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Response from a processed `user.created` event.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Local row id of the stored user
    pub user_id: String,
    /// Provider user id
    pub external_id: String,
    /// Role written to private metadata
    pub role: String,
    /// Always `created`
    pub status: String,
}

/// Receives a `user.created` webhook.
///
/// # Errors
///
/// Returns appropriate HTTP status codes:
/// - 400: Malformed payload, unsupported event type or missing user id
/// - 401: Signature verification failed
/// - 413: Payload too large (>1MiB)
/// - 500: User could not be stored
/// - 502: Identity provider rejected the metadata update
#[instrument(
    name = "receive_clerk_webhook",
    skip(state, headers, body),
    fields(
        payload_size = field::Empty,
        svix_id = headers.get("svix-id").and_then(|v| v.to_str().ok()).unwrap_or("none"),
    )
)]
pub async fn receive_clerk_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let result = match body {
        Ok(body) => {
            Span::current().record("payload_size", body.len());
            process_webhook(&state, &headers, &body).await
        },
        Err(rejection) => Err(WebhookError::from(rejection)),
    };

    match result {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            match &e {
                WebhookError::Database(source) => {
                    error!(code = e.code(), error = %source, "User could not be stored");
                },
                WebhookError::IdentityProvider(source) => {
                    error!(code = e.code(), error = %source, "Role assignment failed");
                },
                _ => warn!(code = e.code(), error = %e, "Webhook rejected"),
            }
            e.into_response()
        },
    }
}

async fn process_webhook(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<WebhookResponse, WebhookError> {
    if let Some(secret) = &state.webhook.signing_secret {
        crypto::verify_webhook(headers, body, secret, state.webhook.tolerance).map_err(|e| {
            debug!(reason = %e, "Signature verification failed");
            WebhookError::InvalidToken
        })?;
    }

    let event = decode_event(body)?;
    debug!(event_type = event.event_type(), object = ?event.object, "Decoded webhook event");

    let external_id = event.data.external_id().ok_or(WebhookError::MissingId)?.to_string();

    let new_user = event.data.to_new_user();
    debug!(
        external_id = %new_user.external_id,
        has_email = !new_user.email.is_empty(),
        has_image = !new_user.image_url.is_empty(),
        "Mapped user fields"
    );

    let user = state.store.create_user(new_user).await?;
    info!(user_id = %user.id, external_id = %external_id, "User stored");

    let metadata = serde_json::json!({ "role": state.webhook.default_role });
    state.identity.update_private_metadata(&external_id, &metadata).await?;
    info!(external_id = %external_id, role = %state.webhook.default_role, "Role assigned");

    Ok(WebhookResponse {
        user_id: user.id.to_string(),
        external_id,
        role: state.webhook.default_role.clone(),
        status: "created".to_string(),
    })
}

/// Decodes the body, rejecting events other than `user.created` before the
/// user shape is checked.
fn decode_event(body: &[u8]) -> Result<WebhookEvent, WebhookError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| WebhookError::InvalidPayload { message: e.to_string() })?;

    let event_type = value.get("type").and_then(serde_json::Value::as_str);
    if event_type != Some(USER_CREATED) {
        return Err(WebhookError::UnsupportedEvent {
            event_type: event_type.unwrap_or("<none>").to_string(),
        });
    }

    serde_json::from_value(value)
        .map_err(|e| WebhookError::InvalidPayload { message: e.to_string() })
}
