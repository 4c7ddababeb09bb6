//! The common error taxonomy shared by every module (`spec.md` §7).
//!
//! Individual crates define their own `thiserror` enums for domain-specific
//! failure modes (e.g. `saga_payments::PaymentError`), but every one of them
//! converts into a [`CoreError`] at its public boundary so the gateway has a
//! single type to map to an HTTP response.

use thiserror::Error;

/// A coarse HTTP status, independent of any particular web framework, so
/// `saga-core` doesn't need to depend on `axum`/`http`. `saga-gateway`
/// converts this to `axum::http::StatusCode`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HttpStatus {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    InternalServerError,
}

/// Anything that can report the HTTP status a caller should see, per the
/// propagation table in `spec.md` §7.
pub trait ToHttpStatus {
    fn to_http_status(&self) -> HttpStatus;
}

/// The error kinds named in `spec.md` §7.
#[derive(Debug, Error)]
pub enum CoreError {
    /// DB/bus/provider I/O failure. Callers retry at the relevant
    /// tick/poll granularity; never surfaced directly to an HTTP caller.
    #[error("transient transport error: {0}")]
    TransientTransport(#[source] anyhow::Error),

    /// A broken invariant: a bug, data corruption, or a business rule that
    /// was violated (e.g. a refund that would exceed the refundable amount).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// An idempotency key was reused with a different request fingerprint.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A duplicate request is still being processed by another writer.
    #[error("in progress")]
    InProgress,

    /// The caller's input was rejected.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller's credentials did not verify.
    #[error("unauthorized")]
    Unauthorized,

    /// The caller is authenticated but not permitted to perform the action.
    #[error("forbidden")]
    Forbidden,
}

impl ToHttpStatus for CoreError {
    fn to_http_status(&self) -> HttpStatus {
        match self {
            CoreError::ValidationError(_) => HttpStatus::BadRequest,
            CoreError::Unauthorized => HttpStatus::Unauthorized,
            CoreError::Forbidden => HttpStatus::Forbidden,
            CoreError::NotFound(_) => HttpStatus::NotFound,
            CoreError::Conflict(_) => HttpStatus::Conflict,
            CoreError::InProgress => HttpStatus::Conflict,
            CoreError::TransientTransport(_) => HttpStatus::InternalServerError,
            CoreError::InvariantViolation(_) => HttpStatus::InternalServerError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_spec_table() {
        assert_eq!(
            CoreError::ValidationError("bad".into()).to_http_status(),
            HttpStatus::BadRequest
        );
        assert_eq!(CoreError::Unauthorized.to_http_status(), HttpStatus::Unauthorized);
        assert_eq!(CoreError::Forbidden.to_http_status(), HttpStatus::Forbidden);
        assert_eq!(
            CoreError::NotFound("x".into()).to_http_status(),
            HttpStatus::NotFound
        );
        assert_eq!(
            CoreError::Conflict("x".into()).to_http_status(),
            HttpStatus::Conflict
        );
        assert_eq!(CoreError::InProgress.to_http_status(), HttpStatus::Conflict);
        assert_eq!(
            CoreError::InvariantViolation("x".into()).to_http_status(),
            HttpStatus::InternalServerError
        );
    }
}
