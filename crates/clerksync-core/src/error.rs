//! Error types for storage and domain operations.
//!
//! Storage failures are normalised into `CoreError` so callers never match on
//! driver-specific errors. Request-level failures with HTTP semantics live in
//! the API crate and wrap this type.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Storage failure.
///
/// The users table carries no unique or check constraints and lookups return
/// collections, so every driver error surfaces as `Database`.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlx_errors_map_to_database() {
        for source in [sqlx::Error::PoolTimedOut, sqlx::Error::RowNotFound, sqlx::Error::PoolClosed]
        {
            let err = CoreError::from(source);
            assert!(matches!(err, CoreError::Database(_)));
            assert!(err.to_string().starts_with("Database error:"));
        }
    }
}
