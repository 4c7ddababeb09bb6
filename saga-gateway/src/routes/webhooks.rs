use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use saga_core::hash::verify_hmac_sha256_hex;
use saga_core::CoreError;
use saga_payments::WebhookEvent;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// `POST /webhooks/:provider` — verifies the HMAC signature against the raw
/// request body before handing a normalized event to
/// `PaymentStateMachine::apply_webhook` (`spec.md` §4.7 "Webhook ingestion").
/// The state machine itself never sees an unverified payload; that split is
/// recorded in the design ledger.
pub async fn ingest(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<StatusCode, ApiError> {
    let signature = headers
        .get("x-webhook-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError(CoreError::ValidationError("missing signature header".to_string())))?;

    if !verify_hmac_sha256_hex(state.webhook_secret.as_bytes(), &body, signature) {
        return Err(ApiError(CoreError::Unauthorized));
    }

    let parsed: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|error| ApiError(CoreError::ValidationError(format!("malformed webhook body: {error}"))))?;

    let event = WebhookEvent {
        provider,
        event_id: parsed.event_id,
        normalized_type: parsed.event_type,
        payment_id: parsed.payment_id,
        external_ref: parsed.external_ref,
    };

    state
        .machine
        .apply_webhook(&parsed.tenant_id, event, signature, &body)
        .await?;

    Ok(StatusCode::OK)
}

#[derive(Debug, serde::Deserialize)]
struct WebhookPayload {
    tenant_id: String,
    event_id: String,
    event_type: String,
    payment_id: Uuid,
    external_ref: Option<String>,
}
