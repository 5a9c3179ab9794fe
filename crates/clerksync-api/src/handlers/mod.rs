//! HTTP request handlers for the clerksync API.
//!
//! - `webhook` - identity provider webhook receiver
//! - `health` - health, readiness and liveness probes
//!
//! Failures are returned as `{"error": {"code", "message"}}` with the status
//! taken from [`crate::WebhookError`].

pub mod health;
pub mod webhook;

pub use health::{health_check, liveness_check, readiness_check};
pub use webhook::receive_clerk_webhook;
