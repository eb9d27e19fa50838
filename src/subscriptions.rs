use std::sync::Arc;

use crate::{
    domain::{validate_client_token, ClientToken, FieldError, SubscriberEmail},
    storage::{StorageError, SubscriberStore},
};

#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error(transparent)]
    Validation(#[from] FieldError),

    #[error("email already subscribed")]
    Duplicate,

    #[error(transparent)]
    Internal(eyre::Report),
}

/// Subscribes addresses on behalf of the one authorized client.
#[derive(Clone)]
pub struct Subscriptions {
    store: Arc<dyn SubscriberStore>,
    client_token: ClientToken,
}

impl Subscriptions {
    pub fn new(store: impl SubscriberStore + 'static, client_token: ClientToken) -> Self {
        Self {
            store: Arc::new(store),
            client_token,
        }
    }

    /// Validate the request and store `raw_email` unless it is already subscribed.
    ///
    /// The email is validated before the token. The existence check only exists to give a
    /// friendly answer to the common case; the store's unique index decides races.
    #[tracing::instrument(skip_all, fields(email = tracing::field::Empty))]
    pub async fn subscribe(
        &self,
        raw_email: &str,
        raw_token: &str,
    ) -> Result<(), SubscriptionError> {
        let email = SubscriberEmail::parse(raw_email)?;
        validate_client_token(raw_token, &self.client_token)?;

        tracing::Span::current().record("email", &tracing::field::display(&email));

        let exists = self
            .store
            .email_exists(&email)
            .await
            .map_err(|error| match error {
                StorageError::Conflict => SubscriptionError::Duplicate,
                StorageError::Unexpected(error) => SubscriptionError::Internal(
                    error.wrap_err("failed to check for existing subscriber"),
                ),
            })?;
        if exists {
            return Err(SubscriptionError::Duplicate);
        }

        self.store
            .create_email(&email)
            .await
            .map_err(|error| match error {
                StorageError::Conflict => {
                    tracing::debug!("lost insert race to a concurrent subscription");
                    SubscriptionError::Duplicate
                }
                StorageError::Unexpected(error) => {
                    SubscriptionError::Internal(error.wrap_err("failed to store new subscriber"))
                }
            })?;

        tracing::info!("new subscriber stored");
        Ok(())
    }
}
