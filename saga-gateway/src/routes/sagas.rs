use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use saga_core::CoreError;
use saga_facade::{OrderLine, StartOrderCreate};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::claims::Claims;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartOrderCreateBody {
    pub lines: Vec<OrderLineBody>,
    pub total_minor: i64,
    pub currency_code: String,
    pub correlation_id: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderLineBody {
    pub sku: String,
    pub quantity: i64,
    pub unit_price_minor: i64,
}

pub async fn start_order_create(
    State(state): State<AppState>,
    claims: Claims,
    Json(body): Json<StartOrderCreateBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if body.lines.is_empty() {
        return Err(ApiError(CoreError::ValidationError(
            "lines must be non-empty".to_string(),
        )));
    }

    let cmd = StartOrderCreate {
        tenant_id: claims.tenant_id,
        user_id: claims.user_id,
        lines: body
            .lines
            .into_iter()
            .map(|line| OrderLine {
                sku: line.sku,
                quantity: line.quantity,
                unit_price_minor: line.unit_price_minor,
            })
            .collect(),
        total_minor: body.total_minor,
        currency_code: body.currency_code,
        correlation_id: body.correlation_id,
        idempotency_key: body.idempotency_key,
    };

    let saga_id = state.facade.start_order_create(cmd).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "sagaId": saga_id }))))
}
