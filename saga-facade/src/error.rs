use saga_core::{CoreError, HttpStatus, ToHttpStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FacadeError {
    #[error("status store error: {0}")]
    Status(#[from] saga_status::StatusError),

    #[error("outbox error: {0}")]
    Outbox(#[from] saga_outbox::OutboxError),
}

impl FacadeError {
    /// A short, stable tag for the `command_publish_failed:<error-class>`
    /// reason code (`spec.md` §4.6 step 6).
    pub fn class(&self) -> &'static str {
        match self {
            FacadeError::Status(_) => "status_store",
            FacadeError::Outbox(_) => "outbox",
        }
    }
}

impl From<FacadeError> for CoreError {
    fn from(error: FacadeError) -> Self {
        match error {
            FacadeError::Status(error) => error.into(),
            FacadeError::Outbox(error) => error.into(),
        }
    }
}

impl ToHttpStatus for FacadeError {
    fn to_http_status(&self) -> HttpStatus {
        HttpStatus::InternalServerError
    }
}
