mod subscriptions;

use axum::http::StatusCode;

pub(crate) use subscriptions::*;

/// Liveness check; does not touch the database.
#[tracing::instrument]
pub(crate) async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
