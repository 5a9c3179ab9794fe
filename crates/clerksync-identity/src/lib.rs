//! Client for the identity provider's backend API.
//!
//! After a user row is stored, the webhook handler calls back into the
//! provider to tag the new identity with its default role. This crate owns
//! that outbound call and the categorisation of its failures.
//!
//! # Example
//!
//! ```no_run
//! use clerksync_identity::{ClerkClient, ClientConfig, IdentityError};
//! use serde_json::json;
//!
//! # async fn example() -> std::result::Result<(), IdentityError> {
//! let client = ClerkClient::new(ClientConfig {
//!     secret_key: "sk_test_...".to_string(),
//!     ..ClientConfig::default()
//! })?;
//!
//! client.update_private_metadata("user_2abc", &json!({ "role": "guest" })).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod client;
pub mod error;

pub use client::{ClerkClient, ClerkUser, ClientConfig, DEFAULT_API_URL};
pub use error::{IdentityError, Result};

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
