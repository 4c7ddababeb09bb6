use saga_core::{CoreError, HttpStatus, ToHttpStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("provider error: {0}")]
    Provider(#[source] anyhow::Error),

    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("idempotency conflict: {0}")]
    Conflict(String),

    #[error("in progress")]
    InProgress,

    #[error("not found: {0}")]
    NotFound(String),
}

impl From<saga_outbox::OutboxError> for PaymentError {
    fn from(error: saga_outbox::OutboxError) -> Self {
        match CoreError::from(error) {
            CoreError::TransientTransport(error) => PaymentError::Provider(error),
            other => PaymentError::Invariant(other.to_string()),
        }
    }
}

impl From<PaymentError> for CoreError {
    fn from(error: PaymentError) -> Self {
        match error {
            PaymentError::Storage(error) => CoreError::TransientTransport(error.into()),
            PaymentError::Provider(error) => CoreError::TransientTransport(error),
            PaymentError::Invariant(message) => CoreError::InvariantViolation(message),
            PaymentError::Validation(message) => CoreError::ValidationError(message),
            PaymentError::Conflict(message) => CoreError::Conflict(message),
            PaymentError::InProgress => CoreError::InProgress,
            PaymentError::NotFound(message) => CoreError::NotFound(message),
        }
    }
}

impl ToHttpStatus for PaymentError {
    fn to_http_status(&self) -> HttpStatus {
        match self {
            PaymentError::Storage(_) | PaymentError::Provider(_) => {
                HttpStatus::InternalServerError
            }
            PaymentError::Invariant(_) => HttpStatus::InternalServerError,
            PaymentError::Validation(_) => HttpStatus::BadRequest,
            PaymentError::Conflict(_) | PaymentError::InProgress => HttpStatus::Conflict,
            PaymentError::NotFound(_) => HttpStatus::NotFound,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider transport error: {0}")]
    Transport(#[source] anyhow::Error),

    #[error("provider returned a malformed response: {0}")]
    Malformed(String),
}

impl From<ProviderError> for PaymentError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::Transport(error) => PaymentError::Provider(error),
            ProviderError::Malformed(message) => PaymentError::Provider(anyhow::anyhow!(message)),
        }
    }
}
