//! Maps every module-level error in this workspace to an HTTP response via
//! `saga_core::ToHttpStatus`, per `spec.md` §7's propagation table.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use saga_core::{CoreError, HttpStatus, ToHttpStatus};
use serde_json::json;

pub struct ApiError(pub CoreError);

impl<E> From<E> for ApiError
where
    E: Into<CoreError>,
{
    fn from(error: E) -> Self {
        ApiError(error.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.to_http_status() {
            HttpStatus::BadRequest => StatusCode::BAD_REQUEST,
            HttpStatus::Unauthorized => StatusCode::UNAUTHORIZED,
            HttpStatus::Forbidden => StatusCode::FORBIDDEN,
            HttpStatus::NotFound => StatusCode::NOT_FOUND,
            HttpStatus::Conflict => StatusCode::CONFLICT,
            HttpStatus::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}
