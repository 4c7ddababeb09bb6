use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use saga_payments::{AuthorizeCommand, DisputeStatus, Payment};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::claims::Claims;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AuthorizeBody {
    pub saga_id: Uuid,
    pub order_id: String,
    pub amount_minor: i64,
    pub currency_code: String,
    pub psp: String,
    pub method: Option<String>,
    pub idempotency_key: String,
}

pub async fn authorize(
    State(state): State<AppState>,
    claims: Claims,
    Json(body): Json<AuthorizeBody>,
) -> Result<(StatusCode, Json<Payment>), ApiError> {
    let cmd = AuthorizeCommand {
        tenant_id: claims.tenant_id.clone(),
        saga_id: body.saga_id,
        order_id: body.order_id,
        user_id: claims.user_id,
        amount_minor: body.amount_minor,
        currency_code: body.currency_code,
        psp: body.psp,
        method: body.method,
        idempotency_key: body.idempotency_key.clone(),
    };
    let request = serde_json::to_value(&cmd).unwrap_or(Value::Null);
    let machine = state.machine.clone();
    let payment = state
        .idempotency
        .execute(&claims.tenant_id, &body.idempotency_key, &request, || async move {
            let payment = machine.authorize(cmd).await?;
            Ok((payment, StatusCode::CREATED.as_u16()))
        })
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

#[derive(Debug, Deserialize)]
pub struct CaptureBody {
    pub amount_minor: Option<i64>,
    pub currency_code: String,
}

pub async fn capture(
    State(state): State<AppState>,
    claims: Claims,
    Path(payment_id): Path<Uuid>,
    Json(body): Json<CaptureBody>,
) -> Result<Json<Payment>, ApiError> {
    let payment = state
        .machine
        .capture(&claims.tenant_id, payment_id, body.amount_minor, &body.currency_code)
        .await?;
    Ok(Json(payment))
}

#[derive(Debug, Deserialize)]
pub struct RefundBody {
    pub amount_minor: i64,
    pub currency_code: String,
    pub reason: Option<String>,
}

pub async fn refund(
    State(state): State<AppState>,
    claims: Claims,
    Path(payment_id): Path<Uuid>,
    Json(body): Json<RefundBody>,
) -> Result<Json<Payment>, ApiError> {
    let payment = state
        .machine
        .refund(
            &claims.tenant_id,
            payment_id,
            body.amount_minor,
            &body.currency_code,
            body.reason.as_deref(),
        )
        .await?;
    Ok(Json(payment))
}

#[derive(Debug, Deserialize)]
pub struct OpenDisputeBody {
    pub psp: String,
    pub psp_dispute_id: String,
}

pub async fn open_dispute(
    State(state): State<AppState>,
    claims: Claims,
    Path(payment_id): Path<Uuid>,
    Json(body): Json<OpenDisputeBody>,
) -> Result<StatusCode, ApiError> {
    state
        .machine
        .open_dispute(&claims.tenant_id, payment_id, &body.psp, &body.psp_dispute_id)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
pub struct TransitionDisputeBody {
    pub psp: String,
    pub next: String,
}

pub async fn transition_dispute(
    State(state): State<AppState>,
    claims: Claims,
    Path((payment_id, psp_dispute_id)): Path<(Uuid, String)>,
    Json(body): Json<TransitionDisputeBody>,
) -> Result<Json<Value>, ApiError> {
    let next = DisputeStatus::parse(&body.next)
        .ok_or_else(|| ApiError(saga_core::CoreError::ValidationError(format!("unknown dispute status {}", body.next))))?;
    state
        .machine
        .transition_dispute(&claims.tenant_id, payment_id, &body.psp, &psp_dispute_id, next)
        .await?;
    Ok(Json(json!({ "status": body.next })))
}
