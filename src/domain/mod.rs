mod client_token;
mod subscriber_email;

use std::fmt;

pub use self::{
    client_token::{validate_client_token, ClientToken},
    subscriber_email::{normalize_email, validate_email, SubscriberEmail, MAX_EMAIL_LENGTH},
};

/// The request field a [`FieldError`] refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Email,
    ClientToken,
}

impl Field {
    /// The field's name as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::ClientToken => "clientToken",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which validation rule a field violated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reason {
    Required,
    TooLong,
    InvalidFormat,
    Invalid,
}

/// A user-correctable problem with one request field.
///
/// Renders as `"<field>: <message>"`, which is what clients receive in the `error` key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub reason: Reason,
}

impl FieldError {
    pub(crate) fn new(field: Field, reason: Reason) -> Self {
        Self { field, reason }
    }

    /// Human readable description of the violated rule.
    pub fn message(&self) -> String {
        match (self.field, self.reason) {
            (field, Reason::Required) => format!("{} is required", field),
            (field, Reason::TooLong) => {
                format!("{} is too long (max {} characters)", field, MAX_EMAIL_LENGTH)
            }
            (field, Reason::InvalidFormat) => format!("invalid {} format", field),
            (field, Reason::Invalid) => format!("invalid {}", field),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message())
    }
}

impl std::error::Error for FieldError {}
