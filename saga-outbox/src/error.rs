use saga_core::{CoreError, HttpStatus, ToHttpStatus};
use thiserror::Error;

/// Storage-layer failures for [`crate::OutboxStore`]. Every variant converts
/// into [`CoreError::TransientTransport`] at the crate boundary: a database
/// hiccup is never itself meaningful to an HTTP caller, only to the
/// publisher's retry loop.
#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("outbox storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl From<OutboxError> for CoreError {
    fn from(err: OutboxError) -> Self {
        CoreError::TransientTransport(err.into())
    }
}

impl ToHttpStatus for OutboxError {
    fn to_http_status(&self) -> HttpStatus {
        HttpStatus::InternalServerError
    }
}
