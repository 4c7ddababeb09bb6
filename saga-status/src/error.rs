use saga_core::{CoreError, HttpStatus, ToHttpStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("saga status storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl From<StatusError> for CoreError {
    fn from(err: StatusError) -> Self {
        CoreError::TransientTransport(err.into())
    }
}

impl ToHttpStatus for StatusError {
    fn to_http_status(&self) -> HttpStatus {
        HttpStatus::InternalServerError
    }
}
