//! `PaymentStateMachine`: the most intricate participant (`spec.md` §4.7).
//! Every public operation runs inside a single storage transaction; the
//! domain event it emits is written to the same transaction's outbox row
//! so the event and the state change commit or abort together.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use saga_outbox::OutboxStore;
use serde::Serialize;
use uuid::Uuid;

use crate::entity::{AttemptStatus, CaptureStatus, DisputeStatus, Payment, PaymentStatus, RefundStatus};
use crate::error::PaymentError;
use crate::ledger::Ledger;
use crate::provider::{ProviderAdapter, ProviderRequest};
use crate::store::PaymentStore;

#[derive(Serialize)]
pub struct AuthorizeCommand {
    pub tenant_id: String,
    pub saga_id: Uuid,
    pub order_id: String,
    pub user_id: String,
    pub amount_minor: i64,
    pub currency_code: String,
    pub psp: String,
    pub method: Option<String>,
    pub idempotency_key: String,
}

pub struct WebhookEvent {
    pub provider: String,
    pub event_id: String,
    pub normalized_type: String,
    pub payment_id: Uuid,
    pub external_ref: Option<String>,
}

/// `remaining = amount_minor − Σ SUCCEEDED captures`; `requested` defaults to
/// `remaining` and must not overflow it (`spec.md` §4.7 `capture`).
fn resolve_capture_amount(
    payment_amount_minor: i64,
    already_captured: i64,
    requested: Option<i64>,
) -> Result<i64, PaymentError> {
    let remaining = payment_amount_minor - already_captured;
    let requested = requested.unwrap_or(remaining);
    if requested <= 0 || requested > remaining {
        return Err(PaymentError::Validation(format!(
            "capture of {requested} would overflow remaining {remaining}"
        )));
    }
    Ok(requested)
}

/// `refundable = Σ SUCCEEDED captures − Σ (PENDING+SUCCEEDED) refunds`
/// (`spec.md` §4.7 `refund`).
fn resolve_refund_amount(
    captured: i64,
    already_refunded: i64,
    requested: i64,
) -> Result<i64, PaymentError> {
    let refundable = captured - already_refunded;
    if captured == 0 || requested > refundable {
        return Err(PaymentError::Invariant(format!(
            "exceeds refundable ({refundable})"
        )));
    }
    Ok(requested)
}

pub struct PaymentStateMachine {
    store: PaymentStore,
    outbox: OutboxStore,
    provider: Arc<dyn ProviderAdapter>,
}

impl PaymentStateMachine {
    pub fn new(store: PaymentStore, outbox: OutboxStore, provider: Arc<dyn ProviderAdapter>) -> Self {
        Self {
            store,
            outbox,
            provider,
        }
    }

    fn headers(tenant_id: &str, saga_id: Uuid) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert("tenant-id".to_string(), tenant_id.to_string());
        headers.insert("saga-id".to_string(), saga_id.to_string());
        headers
    }

    /// `spec.md` §4.7 `authorize`.
    #[tracing::instrument(skip_all, name = "payments.authorize", fields(tenant_id = %cmd.tenant_id, order_id = %cmd.order_id))]
    pub async fn authorize(&self, cmd: AuthorizeCommand) -> Result<Payment, PaymentError> {
        let mut tx = self.store.pool().begin().await?;

        if let Some(existing) = self
            .store
            .find_by_saga(&mut tx, &cmd.tenant_id, cmd.saga_id)
            .await?
        {
            tx.commit().await?;
            return Ok(existing);
        }
        if let Some(existing) = self
            .store
            .lock_latest_active_by_order(&mut tx, &cmd.tenant_id, &cmd.order_id)
            .await?
        {
            tx.commit().await?;
            return Ok(existing);
        }

        let payment = self
            .store
            .insert_payment(
                &mut tx,
                &cmd.tenant_id,
                cmd.saga_id,
                &cmd.order_id,
                &cmd.user_id,
                cmd.amount_minor,
                &cmd.currency_code,
                &cmd.psp,
            )
            .await?;

        self.store
            .insert_attempt(&mut tx, payment.id, 1, AttemptStatus::Pending, None, None, None)
            .await?;

        let provider_request = ProviderRequest {
            amount_minor: cmd.amount_minor,
            currency_code: cmd.currency_code.clone(),
            reference: cmd.order_id.clone(),
            method: cmd.method.clone(),
            idempotency_key: cmd.idempotency_key.clone(),
        };
        let result = self.provider.authorize(provider_request).await;

        let (final_status, event_type, reason) = match result {
            Ok(outcome) if outcome.ok => {
                self.store
                    .insert_attempt(
                        &mut tx,
                        payment.id,
                        2,
                        AttemptStatus::Succeeded,
                        outcome.external_ref.as_deref(),
                        None,
                        None,
                    )
                    .await?;
                Ledger::post_authorization(
                    &mut tx,
                    &cmd.tenant_id,
                    payment.id,
                    cmd.amount_minor,
                    &cmd.currency_code,
                    Utc::now().date_naive(),
                )
                .await?;
                let updated = self
                    .store
                    .update_payment_status(
                        &mut tx,
                        payment.id,
                        PaymentStatus::Authorized,
                        outcome.external_ref.as_deref(),
                    )
                    .await?;
                (updated, "PAYMENT_AUTHORIZED", None)
            }
            Ok(outcome) => {
                self.store
                    .insert_attempt(
                        &mut tx,
                        payment.id,
                        2,
                        AttemptStatus::Failed,
                        None,
                        outcome.failure_code.as_deref(),
                        outcome.failure_reason.as_deref(),
                    )
                    .await?;
                let updated = self
                    .store
                    .update_payment_status(
                        &mut tx,
                        payment.id,
                        PaymentStatus::Failed,
                        None,
                    )
                    .await?;
                (updated, "PAYMENT_AUTH_FAILED", outcome.failure_reason)
            }
            Err(error) => {
                self.store
                    .insert_attempt(
                        &mut tx,
                        payment.id,
                        2,
                        AttemptStatus::Failed,
                        None,
                        Some("provider_error"),
                        Some(&error.to_string()),
                    )
                    .await?;
                let updated = self
                    .store
                    .update_payment_status(
                        &mut tx,
                        payment.id,
                        PaymentStatus::Failed,
                        None,
                    )
                    .await?;
                (updated, "PAYMENT_AUTH_FAILED", Some(error.to_string()))
            }
        };

        self.emit(&mut tx, &final_status, event_type, reason).await?;
        tx.commit().await?;
        Ok(final_status)
    }

    /// `spec.md` §4.7 `capture`.
    #[tracing::instrument(skip_all, name = "payments.capture", fields(payment_id = %payment_id))]
    pub async fn capture(
        &self,
        tenant_id: &str,
        payment_id: Uuid,
        amount_minor: Option<i64>,
        currency_code: &str,
    ) -> Result<Payment, PaymentError> {
        let mut tx = self.store.pool().begin().await?;

        let payment = self
            .store
            .lock_by_id(&mut tx, tenant_id, payment_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("payment {payment_id}")))?;

        let status = payment.status();
        if !matches!(
            status,
            PaymentStatus::Authorized | PaymentStatus::Capturing
        ) {
            return Err(PaymentError::Validation(format!(
                "payment {payment_id} is not capturable in state {status:?}"
            )));
        }
        if currency_code != payment.currency_code {
            return Err(PaymentError::Validation(
                "capture currency must equal payment currency".to_string(),
            ));
        }

        let already_captured = self.store.sum_succeeded_captures(&mut tx, payment_id).await?;
        let requested = resolve_capture_amount(payment.amount_minor, already_captured, amount_minor)?;

        let capture = self
            .store
            .insert_capture(&mut tx, payment_id, requested, currency_code)
            .await?;

        let provider_request = ProviderRequest {
            amount_minor: requested,
            currency_code: currency_code.to_string(),
            reference: payment.order_id.clone(),
            method: None,
            idempotency_key: format!("capture:{}", capture.id),
        };
        let result = self.provider.capture(provider_request).await?;

        if !result.ok {
            self.store
                .update_capture_status(&mut tx, capture.id, CaptureStatus::Failed, None)
                .await?;
            tx.commit().await?;
            return Err(PaymentError::Validation(format!(
                "capture rejected by provider: {}",
                result.failure_reason.unwrap_or_default()
            )));
        }

        self.store
            .update_capture_status(
                &mut tx,
                capture.id,
                CaptureStatus::Succeeded,
                result.external_ref.as_deref(),
            )
            .await?;

        Ledger::post_capture(
            &mut tx,
            tenant_id,
            payment_id,
            capture.id,
            requested,
            currency_code,
            Utc::now().date_naive(),
        )
        .await?;

        let now_captured = already_captured + requested;
        let new_status = if now_captured >= payment.amount_minor {
            PaymentStatus::Captured
        } else {
            PaymentStatus::Capturing
        };
        let updated = self
            .store
            .update_payment_status(&mut tx, payment_id, new_status, None)
            .await?;

        self.emit(&mut tx, &updated, "PAYMENT_CAPTURED", None).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// `spec.md` §4.7 `refund`.
    #[tracing::instrument(skip_all, name = "payments.refund", fields(payment_id = %payment_id))]
    pub async fn refund(
        &self,
        tenant_id: &str,
        payment_id: Uuid,
        amount_minor: i64,
        currency_code: &str,
        reason: Option<&str>,
    ) -> Result<Payment, PaymentError> {
        let mut tx = self.store.pool().begin().await?;

        let payment = self
            .store
            .lock_by_id(&mut tx, tenant_id, payment_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("payment {payment_id}")))?;

        let status = payment.status();
        if matches!(
            status,
            PaymentStatus::Failed | PaymentStatus::Cancelled
        ) {
            return Err(PaymentError::Validation(format!(
                "payment {payment_id} cannot be refunded in state {status:?}"
            )));
        }
        if currency_code != payment.currency_code {
            return Err(PaymentError::Validation(
                "refund currency must equal payment currency".to_string(),
            ));
        }

        let captured = self.store.sum_succeeded_captures(&mut tx, payment_id).await?;
        let already_refunded = self
            .store
            .sum_pending_and_succeeded_refunds(&mut tx, payment_id)
            .await?;
        resolve_refund_amount(captured, already_refunded, amount_minor)?;

        let capture = self.store.latest_succeeded_capture(&mut tx, payment_id).await?;
        let refund = self
            .store
            .insert_refund(
                &mut tx,
                payment_id,
                capture.as_ref().map(|c| c.id),
                amount_minor,
                currency_code,
                reason,
            )
            .await?;

        let provider_request = ProviderRequest {
            amount_minor,
            currency_code: currency_code.to_string(),
            reference: payment.order_id.clone(),
            method: None,
            idempotency_key: format!("refund:{}", refund.id),
        };
        let result = self.provider.refund(provider_request).await?;

        if !result.ok {
            self.store
                .update_refund_status(&mut tx, refund.id, RefundStatus::Failed)
                .await?;
            tx.commit().await?;
            return Ok(payment);
        }

        self.store
            .update_refund_status(&mut tx, refund.id, RefundStatus::Succeeded)
            .await?;

        Ledger::post_refund(
            &mut tx,
            tenant_id,
            payment_id,
            refund.id,
            amount_minor,
            currency_code,
            Utc::now().date_naive(),
        )
        .await?;

        self.emit(&mut tx, &payment, "PAYMENT_REFUNDED", reason.map(str::to_string))
            .await?;
        tx.commit().await?;
        Ok(payment)
    }

    /// `spec.md` §4.7 dispute lifecycle: `open` is idempotent on
    /// `(tenant, psp, psp_dispute_id)`.
    pub async fn open_dispute(
        &self,
        tenant_id: &str,
        payment_id: Uuid,
        psp: &str,
        psp_dispute_id: &str,
    ) -> Result<(), PaymentError> {
        let mut tx = self.store.pool().begin().await?;
        if self
            .store
            .find_dispute(&mut tx, tenant_id, psp, psp_dispute_id)
            .await?
            .is_some()
        {
            tx.commit().await?;
            return Ok(());
        }
        self.store
            .insert_dispute(&mut tx, tenant_id, payment_id, psp, psp_dispute_id)
            .await?;

        let payment = self
            .store
            .lock_by_id(&mut tx, tenant_id, payment_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("payment {payment_id}")))?;
        self.emit(&mut tx, &payment, "PAYMENT_CHARGEBACK_OPENED", None).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Advances a non-terminal dispute to another non-terminal status, or
    /// closes it with a terminal outcome.
    pub async fn transition_dispute(
        &self,
        tenant_id: &str,
        payment_id: Uuid,
        psp: &str,
        psp_dispute_id: &str,
        next: DisputeStatus,
    ) -> Result<(), PaymentError> {
        let mut tx = self.store.pool().begin().await?;
        let dispute = self
            .store
            .find_dispute(&mut tx, tenant_id, psp, psp_dispute_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("dispute {psp}/{psp_dispute_id}")))?;

        if dispute.status().is_terminal() {
            return Err(PaymentError::Validation(
                "dispute already closed".to_string(),
            ));
        }

        self.store
            .update_dispute_status(&mut tx, dispute.id, next)
            .await?;

        if next.is_terminal() {
            let payment = self
                .store
                .lock_by_id(&mut tx, tenant_id, payment_id)
                .await?
                .ok_or_else(|| PaymentError::NotFound(format!("payment {payment_id}")))?;
            self.emit(&mut tx, &payment, "PAYMENT_CHARGEBACK_CLOSED", None)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// `spec.md` §4.7 webhook ingestion. The signature has already been
    /// verified by the caller (`saga_core::hash::verify_hmac_sha256_hex`)
    /// against the provider's canonical string; this only handles
    /// dedup-by-`(provider, event_id)` and applying the normalized event.
    #[tracing::instrument(skip_all, name = "payments.apply_webhook", fields(provider = %event.provider, event_id = %event.event_id))]
    pub async fn apply_webhook(
        &self,
        tenant_id: &str,
        event: WebhookEvent,
        signature: &str,
        raw_payload: &[u8],
    ) -> Result<(), PaymentError> {
        let mut tx = self.store.pool().begin().await?;

        let is_new = self
            .store
            .record_webhook_if_new(&mut tx, &event.provider, &event.event_id, signature, raw_payload)
            .await?;
        if !is_new {
            tx.commit().await?;
            return Ok(());
        }

        if event.normalized_type == "CAPTURED" {
            let already_captured = self
                .store
                .latest_succeeded_capture(&mut tx, event.payment_id)
                .await?
                .is_some();
            if !already_captured {
                let payment = self
                    .store
                    .lock_by_id(&mut tx, tenant_id, event.payment_id)
                    .await?
                    .ok_or_else(|| PaymentError::NotFound(format!("payment {}", event.payment_id)))?;
                let updated = self
                    .store
                    .update_payment_status(
                        &mut tx,
                        payment.id,
                        PaymentStatus::Captured,
                        event.external_ref.as_deref(),
                    )
                    .await?;
                self.emit(&mut tx, &updated, "PAYMENT_CAPTURED", None).await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn emit(
        &self,
        tx: &mut sqlx::PgConnection,
        payment: &Payment,
        event_type: &str,
        reason: Option<String>,
    ) -> Result<(), PaymentError> {
        let mut payload = serde_json::json!({
            "type": event_type,
            "sagaId": payment.saga_id,
            "tenantId": payment.tenant_id,
            "userId": payment.user_id,
            "orderId": payment.order_id,
            "paymentId": payment.id,
        });
        if let Some(reason) = reason {
            payload["reason"] = serde_json::Value::String(reason);
        }

        self.outbox
            .insert(
                tx,
                &payment.tenant_id,
                Some(payment.saga_id),
                "PAYMENT",
                Some(&payment.id.to_string()),
                event_type,
                Some(&payment.saga_id.to_string()),
                serde_json::to_vec(&payload).unwrap_or_default(),
                Self::headers(&payment.tenant_id, payment.saga_id),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_defaults_to_the_remaining_balance() {
        assert_eq!(resolve_capture_amount(1000, 0, None).unwrap(), 1000);
        assert_eq!(resolve_capture_amount(1000, 400, None).unwrap(), 600);
    }

    #[test]
    fn capture_rejects_amounts_beyond_remaining() {
        assert!(resolve_capture_amount(1000, 400, Some(700)).is_err());
        assert!(resolve_capture_amount(1000, 1000, None).is_err());
        assert!(resolve_capture_amount(1000, 0, Some(0)).is_err());
    }

    #[test]
    fn refund_is_bounded_by_captured_minus_already_refunded() {
        assert!(resolve_refund_amount(1000, 200, 800).is_ok());
        assert!(resolve_refund_amount(1000, 200, 801).is_err());
        assert!(resolve_refund_amount(0, 0, 1).is_err());
    }
}
