use saga_core::{CoreError, HttpStatus, ToHttpStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus transport error: {0}")]
    Transport(#[source] anyhow::Error),

    #[error("malformed event: {0}")]
    Malformed(String),
}

impl From<BusError> for CoreError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::Transport(e) => CoreError::TransientTransport(e),
            BusError::Malformed(msg) => CoreError::ValidationError(msg),
        }
    }
}

impl ToHttpStatus for BusError {
    fn to_http_status(&self) -> HttpStatus {
        match self {
            BusError::Transport(_) => HttpStatus::InternalServerError,
            BusError::Malformed(_) => HttpStatus::BadRequest,
        }
    }
}
