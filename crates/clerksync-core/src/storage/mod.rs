//! Database access layer for mirrored users.
//!
//! Handlers talk to the [`UserStore`] trait rather than to PostgreSQL
//! directly. [`Storage`] is the production implementation; [`mock`] provides
//! an in-memory store so request handling can be tested without a database.

use std::{future::Future, pin::Pin, sync::Arc};

use sqlx::PgPool;

pub mod users;

use crate::{
    error::Result,
    models::{NewUser, User},
};

/// Storage operations required by the webhook handler.
pub trait UserStore: Send + Sync + 'static {
    /// Inserts a new user row and returns it as stored.
    fn create_user(&self, user: NewUser) -> Pin<Box<dyn Future<Output = Result<User>> + Send + '_>>;

    /// Returns every row recorded for a provider user id, oldest first.
    fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<User>>> + Send + '_>>;

    /// Verifies the backing store is reachable.
    fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Container for all repository instances providing unified database access.
#[derive(Clone)]
pub struct Storage {
    /// Repository for user rows.
    pub users: Arc<users::Repository>,
}

impl Storage {
    /// Creates a new storage instance with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        let pool = Arc::new(pool);

        Self { users: Arc::new(users::Repository::new(pool)) }
    }

    /// Performs a health check on the database connection.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Database` if the connection is unhealthy or
    /// the query times out.
    pub async fn health_check(&self) -> Result<()> {
        let _: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&*self.users.pool()).await?;

        Ok(())
    }
}

impl UserStore for Storage {
    fn create_user(&self, user: NewUser) -> Pin<Box<dyn Future<Output = Result<User>> + Send + '_>> {
        Box::pin(async move { self.users.create(&user).await })
    }

    fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<User>>> + Send + '_>> {
        let external_id = external_id.to_string();
        Box::pin(async move { self.users.find_by_external_id(&external_id).await })
    }

    fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(Storage::health_check(self))
    }
}

pub mod mock {
    //! In-memory user store for tests.
    //!
    //! Keeps rows in insertion order and supports injecting failures for the
    //! next insert or for health checks.

    use std::{future::Future, pin::Pin, sync::Arc};

    use chrono::Utc;
    use tokio::sync::RwLock;

    use super::{NewUser, User, UserStore};
    use crate::error::{CoreError, Result};

    /// Mock store for exercising request handling without a database.
    #[derive(Clone, Default)]
    pub struct MockUserStore {
        users: Arc<RwLock<Vec<User>>>,
        create_error: Arc<RwLock<Option<String>>>,
        health_error: Arc<RwLock<Option<String>>>,
    }

    impl MockUserStore {
        /// Creates a new mock store with no rows.
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes the next `create_user` call fail with a database error.
        pub async fn inject_create_error(&self, error: impl Into<String>) {
            *self.create_error.write().await = Some(error.into());
        }

        /// Makes health checks fail until cleared with `None`.
        pub async fn set_health_error(&self, error: Option<String>) {
            *self.health_error.write().await = error;
        }

        /// Returns a snapshot of all stored rows.
        pub async fn users(&self) -> Vec<User> {
            self.users.read().await.clone()
        }

        /// Number of stored rows.
        pub async fn count(&self) -> usize {
            self.users.read().await.len()
        }
    }

    impl UserStore for MockUserStore {
        fn create_user(
            &self,
            user: NewUser,
        ) -> Pin<Box<dyn Future<Output = Result<User>> + Send + '_>> {
            Box::pin(async move {
                if let Some(error) = self.create_error.write().await.take() {
                    return Err(CoreError::Database(error));
                }

                let user = user.into_user(Utc::now());
                self.users.write().await.push(user.clone());
                Ok(user)
            })
        }

        fn find_by_external_id(
            &self,
            external_id: &str,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<User>>> + Send + '_>> {
            let external_id = external_id.to_string();
            Box::pin(async move {
                Ok(self
                    .users
                    .read()
                    .await
                    .iter()
                    .filter(|user| user.external_id == external_id)
                    .cloned()
                    .collect())
            })
        }

        fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async move {
                match self.health_error.read().await.clone() {
                    Some(error) => Err(CoreError::Database(error)),
                    None => Ok(()),
                }
            })
        }
    }
}
