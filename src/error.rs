use std::{any::Any, fmt, sync::Arc};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    BoxError, Json,
};

use crate::{domain::FieldError, subscriptions::SubscriptionError};

const INVALID_BODY: &str = "Invalid request body";
const INTERNAL: &str = "Internal server error";
const TIMED_OUT: &str = "Request timed out";

/// The JSON body of every API response.
#[derive(Debug, serde::Serialize)]
pub(crate) struct Envelope {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Envelope {
    pub(crate) fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub(crate) fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Error {
    InvalidBody(serde_json::Error),
    Validation(FieldError),
    Duplicate,
    Timeout,
    Internal(eyre::Report),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidBody(error) => write!(f, "invalid request body: {}", error),
            Self::Validation(error) => write!(f, "{}", error),
            Self::Duplicate => write!(f, "email already subscribed"),
            Self::Timeout => write!(f, "request timed out"),
            Self::Internal(error) => write!(f, "{}", error),
        }
    }
}

impl From<SubscriptionError> for Error {
    fn from(error: SubscriptionError) -> Self {
        match error {
            SubscriptionError::Validation(error) => Self::Validation(error),
            SubscriptionError::Duplicate => Self::Duplicate,
            SubscriptionError::Internal(error) => {
                Self::Internal(error.wrap_err("failed to subscribe"))
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidBody(error) => {
                tracing::debug!(%error, "failed to decode request body");
                (StatusCode::BAD_REQUEST, Json(Envelope::failure(INVALID_BODY))).into_response()
            }
            Self::Validation(error) => (
                StatusCode::BAD_REQUEST,
                Json(Envelope::failure(error.to_string())),
            )
                .into_response(),
            Self::Duplicate => (
                StatusCode::BAD_REQUEST,
                Json(Envelope::failure(Self::Duplicate.to_string())),
            )
                .into_response(),
            Self::Timeout => {
                (StatusCode::REQUEST_TIMEOUT, Json(Envelope::failure(TIMED_OUT))).into_response()
            }
            Self::Internal(error) => {
                let mut response = (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(Envelope::failure(INTERNAL)),
                )
                    .into_response();
                response.extensions_mut().insert(Arc::new(error));
                response
            }
        }
    }
}

/// Error handler for the fallible middleware in front of the routes.
pub(crate) async fn handle_middleware_error(error: BoxError) -> Error {
    if error.is::<tower::timeout::error::Elapsed>() {
        Error::Timeout
    } else {
        Error::Internal(eyre::eyre!(error).wrap_err("middleware failed"))
    }
}

/// Turns a panic in a handler into the generic 500 response.
pub(crate) fn recover(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    };

    Error::Internal(eyre::eyre!("handler panicked: {}", detail)).into_response()
}
