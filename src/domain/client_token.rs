use secrecy::{ExposeSecret, Secret};
use subtle::ConstantTimeEq;

use super::{Field, FieldError, Reason};

/// The shared secret an integrating client must present to subscribe addresses.
#[derive(Clone, Debug, serde::Deserialize)]
#[serde(transparent)]
pub struct ClientToken(Secret<String>);

impl ClientToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Secret::new(token.into()))
    }

    pub fn is_blank(&self) -> bool {
        self.0.expose_secret().trim().is_empty()
    }

    fn matches(&self, provided: &str) -> bool {
        provided
            .as_bytes()
            .ct_eq(self.0.expose_secret().as_bytes())
            .into()
    }
}

/// Check the token a client sent against the configured one.
///
/// The provided token is trimmed before comparing; the expected token is used as configured.
pub fn validate_client_token(provided: &str, expected: &ClientToken) -> Result<(), FieldError> {
    let provided = provided.trim();

    if provided.is_empty() {
        return Err(FieldError::new(Field::ClientToken, Reason::Required));
    }
    if !expected.matches(provided) {
        return Err(FieldError::new(Field::ClientToken, Reason::Invalid));
    }

    Ok(())
}
