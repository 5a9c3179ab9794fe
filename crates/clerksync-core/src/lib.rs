//! Core domain models, inbound payload model and storage.
//!
//! Provides the user record mirrored from the identity provider, the typed
//! webhook envelope it is mapped from, and the storage seam the HTTP layer
//! writes through.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod payload;
pub mod storage;

pub use error::{CoreError, Result};
pub use models::{NewUser, User, UserId};
pub use payload::{EmailAddress, UserData, WebhookEvent, USER_CREATED};
pub use storage::{Storage, UserStore};
