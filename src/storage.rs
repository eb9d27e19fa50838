use std::sync::Arc;

use async_trait::async_trait;
use eyre::WrapErr;
use sqlx::PgPool;

use crate::domain::SubscriberEmail;

/// SQLSTATE Postgres reports for a unique index violation.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The address is already stored. Raised by the uniqueness constraint, so it also covers
    /// concurrent inserts that both passed an existence check.
    #[error("email already exists")]
    Conflict,

    #[error(transparent)]
    Unexpected(#[from] eyre::Report),
}

/// Persistence for subscriber addresses.
///
/// Addresses arrive as [`SubscriberEmail`], so they are always in normalized form.
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Is `email` already subscribed?
    async fn email_exists(&self, email: &SubscriberEmail) -> Result<bool, StorageError>;

    /// Store `email` as a new, unconfirmed subscriber.
    async fn create_email(&self, email: &SubscriberEmail) -> Result<(), StorageError>;
}

#[async_trait]
impl<S> SubscriberStore for Arc<S>
where
    S: SubscriberStore + ?Sized,
{
    async fn email_exists(&self, email: &SubscriberEmail) -> Result<bool, StorageError> {
        (**self).email_exists(email).await
    }

    async fn create_email(&self, email: &SubscriberEmail) -> Result<(), StorageError> {
        (**self).create_email(email).await
    }
}

/// [`SubscriberStore`] backed by the `emails` table.
#[derive(Clone)]
pub struct PgSubscriberStore {
    pool: PgPool,
}

impl PgSubscriberStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriberStore for PgSubscriberStore {
    #[tracing::instrument(skip(self))]
    async fn email_exists(&self, email: &SubscriberEmail) -> Result<bool, StorageError> {
        let exists: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (SELECT 1 FROM emails WHERE lower(btrim(email)) = $1)"#,
        )
        .bind(email.as_ref())
        .fetch_one(&self.pool)
        .await
        .wrap_err("failed to check email existence")?;

        Ok(exists)
    }

    #[tracing::instrument(skip(self))]
    async fn create_email(&self, email: &SubscriberEmail) -> Result<(), StorageError> {
        sqlx::query(r#"INSERT INTO emails (email) VALUES ($1)"#)
            .bind(email.as_ref())
            .execute(&self.pool)
            .await
            .map_err(|error| match error {
                sqlx::Error::Database(ref db_error)
                    if db_error.code().as_deref() == Some(UNIQUE_VIOLATION) =>
                {
                    StorageError::Conflict
                }
                error => StorageError::Unexpected(
                    eyre::Report::new(error).wrap_err("failed to insert email"),
                ),
            })?;

        Ok(())
    }
}
