use lazy_static::lazy_static;
use regex::Regex;

use super::{Field, FieldError, Reason};

/// Longest address accepted, in characters, after trimming.
pub const MAX_EMAIL_LENGTH: usize = 254;

lazy_static! {
    static ref EMAIL_SHAPE: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").unwrap(/* known good */);
}

/// Check that `raw` looks like `local@domain.tld`.
///
/// Surrounding whitespace is ignored. Only the shape is checked; nothing is resolved.
pub fn validate_email(raw: &str) -> Result<(), FieldError> {
    let email = raw.trim();

    if email.is_empty() {
        return Err(FieldError::new(Field::Email, Reason::Required));
    }
    if email.chars().count() > MAX_EMAIL_LENGTH {
        return Err(FieldError::new(Field::Email, Reason::TooLong));
    }
    if !EMAIL_SHAPE.is_match(email) {
        return Err(FieldError::new(Field::Email, Reason::InvalidFormat));
    }

    Ok(())
}

/// Canonical stored form of an address: trimmed and lower-cased.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// A validated, normalized subscriber address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriberEmail(String);

impl SubscriberEmail {
    pub fn parse(raw: &str) -> Result<Self, FieldError> {
        validate_email(raw)?;
        Ok(Self(normalize_email(raw)))
    }
}

impl AsRef<str> for SubscriberEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriberEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
