//! Repository for user rows.
//!
//! Inserts are unconditional: there is no uniqueness constraint on
//! `external_id`, so replays of the same webhook produce additional rows.

use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    error::Result,
    models::{NewUser, User},
};

/// Repository for user database operations.
pub struct Repository {
    pool: Arc<PgPool>,
}

impl Repository {
    /// Creates a new repository instance.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Returns a reference to the database pool.
    pub fn pool(&self) -> Arc<PgPool> {
        self.pool.clone()
    }

    /// Inserts a user row and returns it as stored.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails.
    pub async fn create(&self, user: &NewUser) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r"
            INSERT INTO users (external_id, first_name, last_name, email, image_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, external_id, first_name, last_name, email, image_url, created_at
            ",
        )
        .bind(&user.external_id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.image_url)
        .fetch_one(&*self.pool)
        .await?;

        Ok(user)
    }

    /// Finds every row created for a provider user id, oldest first.
    ///
    /// # Errors
    ///
    /// Returns error if query fails.
    pub async fn find_by_external_id(&self, external_id: &str) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r"
            SELECT id, external_id, first_name, last_name, email, image_url, created_at
            FROM users
            WHERE external_id = $1
            ORDER BY created_at ASC
            ",
        )
        .bind(external_id)
        .fetch_all(&*self.pool)
        .await?;

        Ok(users)
    }
}
