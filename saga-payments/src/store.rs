//! Payment aggregate persistence. `spec.md` §5: "PaymentStateMachine
//! operations are serialized per payment by an `UPDATE ... RETURNING` on the
//! payment row or equivalent row-level locking" — every mutation here runs
//! inside the caller's transaction and locks via `FOR UPDATE` where two
//! operations could otherwise race the same payment.

use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entity::{
    AttemptStatus, Capture, CaptureStatus, Dispute, DisputeStatus, Payment, PaymentAttempt,
    PaymentStatus, Refund, RefundStatus,
};
use crate::error::PaymentError;

#[derive(Clone)]
pub struct PaymentStore {
    pool: PgPool,
}

impl PaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn find_by_saga(
        &self,
        tx: &mut PgConnection,
        tenant_id: &str,
        saga_id: Uuid,
    ) -> Result<Option<Payment>, PaymentError> {
        let payment = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE tenant_id = $1 AND saga_id = $2",
        )
        .bind(tenant_id)
        .bind(saga_id)
        .fetch_optional(&mut *tx)
        .await?;
        Ok(payment)
    }

    /// The latest active payment for `(tenant, order_id)`, locked for
    /// update so a concurrent `authorize` on the same order can't race it
    /// (`spec.md` §4.7).
    pub async fn lock_latest_active_by_order(
        &self,
        tx: &mut PgConnection,
        tenant_id: &str,
        order_id: &str,
    ) -> Result<Option<Payment>, PaymentError> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT * FROM payments
            WHERE tenant_id = $1 AND order_id = $2
              AND status IN ('INITIATED', 'AUTHORIZING', 'REQUIRES_ACTION', 'AUTHORIZED', 'CAPTURING')
            ORDER BY created_at DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(tenant_id)
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;
        Ok(payment)
    }

    pub async fn lock_by_id(
        &self,
        tx: &mut PgConnection,
        tenant_id: &str,
        payment_id: Uuid,
    ) -> Result<Option<Payment>, PaymentError> {
        let payment = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
        )
        .bind(tenant_id)
        .bind(payment_id)
        .fetch_optional(&mut *tx)
        .await?;
        Ok(payment)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_payment(
        &self,
        tx: &mut PgConnection,
        tenant_id: &str,
        saga_id: Uuid,
        order_id: &str,
        user_id: &str,
        amount_minor: i64,
        currency_code: &str,
        psp: &str,
    ) -> Result<Payment, PaymentError> {
        let now = Utc::now();
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (
                id, tenant_id, saga_id, order_id, user_id, amount_minor,
                currency_code, status, psp, psp_ref, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NULL, $10, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(saga_id)
        .bind(order_id)
        .bind(user_id)
        .bind(amount_minor)
        .bind(currency_code)
        .bind(PaymentStatus::Initiated.as_str())
        .bind(psp)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        Ok(payment)
    }

    pub async fn update_payment_status(
        &self,
        tx: &mut PgConnection,
        payment_id: Uuid,
        status: PaymentStatus,
        psp_ref: Option<&str>,
    ) -> Result<Payment, PaymentError> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = $2, psp_ref = COALESCE($3, psp_ref), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(payment_id)
        .bind(status.as_str())
        .bind(psp_ref)
        .fetch_one(&mut *tx)
        .await?;
        Ok(payment)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_attempt(
        &self,
        tx: &mut PgConnection,
        payment_id: Uuid,
        attempt_no: i32,
        status: AttemptStatus,
        psp_ref: Option<&str>,
        failure_code: Option<&str>,
        failure_reason: Option<&str>,
    ) -> Result<PaymentAttempt, PaymentError> {
        let attempt = sqlx::query_as::<_, PaymentAttempt>(
            r#"
            INSERT INTO payment_attempts (
                id, payment_id, attempt_no, status, psp_ref, failure_code,
                failure_reason, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(payment_id)
        .bind(attempt_no)
        .bind(status.as_str())
        .bind(psp_ref)
        .bind(failure_code)
        .bind(failure_reason)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;
        Ok(attempt)
    }

    pub async fn sum_succeeded_captures(
        &self,
        tx: &mut PgConnection,
        payment_id: Uuid,
    ) -> Result<i64, PaymentError> {
        let (sum,): (Option<i64>,) = sqlx::query_as(
            "SELECT SUM(amount_minor) FROM captures WHERE payment_id = $1 AND status = 'SUCCEEDED'",
        )
        .bind(payment_id)
        .fetch_one(&mut *tx)
        .await?;
        Ok(sum.unwrap_or(0))
    }

    pub async fn sum_pending_and_succeeded_refunds(
        &self,
        tx: &mut PgConnection,
        payment_id: Uuid,
    ) -> Result<i64, PaymentError> {
        let (sum,): (Option<i64>,) = sqlx::query_as(
            "SELECT SUM(amount_minor) FROM refunds WHERE payment_id = $1 AND status IN ('PENDING', 'SUCCEEDED')",
        )
        .bind(payment_id)
        .fetch_one(&mut *tx)
        .await?;
        Ok(sum.unwrap_or(0))
    }

    pub async fn insert_capture(
        &self,
        tx: &mut PgConnection,
        payment_id: Uuid,
        amount_minor: i64,
        currency_code: &str,
    ) -> Result<Capture, PaymentError> {
        let capture = sqlx::query_as::<_, Capture>(
            r#"
            INSERT INTO captures (
                id, payment_id, amount_minor, currency_code, status,
                psp_capture_ref, created_at
            )
            VALUES ($1, $2, $3, $4, $5, NULL, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(payment_id)
        .bind(amount_minor)
        .bind(currency_code)
        .bind(CaptureStatus::Pending.as_str())
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;
        Ok(capture)
    }

    pub async fn update_capture_status(
        &self,
        tx: &mut PgConnection,
        capture_id: Uuid,
        status: CaptureStatus,
        psp_capture_ref: Option<&str>,
    ) -> Result<Capture, PaymentError> {
        let capture = sqlx::query_as::<_, Capture>(
            r#"
            UPDATE captures
            SET status = $2, psp_capture_ref = COALESCE($3, psp_capture_ref)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(capture_id)
        .bind(status.as_str())
        .bind(psp_capture_ref)
        .fetch_one(&mut *tx)
        .await?;
        Ok(capture)
    }

    pub async fn latest_succeeded_capture(
        &self,
        tx: &mut PgConnection,
        payment_id: Uuid,
    ) -> Result<Option<Capture>, PaymentError> {
        let capture = sqlx::query_as::<_, Capture>(
            r#"
            SELECT * FROM captures
            WHERE payment_id = $1 AND status = 'SUCCEEDED'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(payment_id)
        .fetch_optional(&mut *tx)
        .await?;
        Ok(capture)
    }

    pub async fn insert_refund(
        &self,
        tx: &mut PgConnection,
        payment_id: Uuid,
        capture_id: Option<Uuid>,
        amount_minor: i64,
        currency_code: &str,
        reason: Option<&str>,
    ) -> Result<Refund, PaymentError> {
        let refund = sqlx::query_as::<_, Refund>(
            r#"
            INSERT INTO refunds (
                id, payment_id, capture_id, amount_minor, currency_code,
                status, reason, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(payment_id)
        .bind(capture_id)
        .bind(amount_minor)
        .bind(currency_code)
        .bind(RefundStatus::Pending.as_str())
        .bind(reason)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;
        Ok(refund)
    }

    pub async fn update_refund_status(
        &self,
        tx: &mut PgConnection,
        refund_id: Uuid,
        status: RefundStatus,
    ) -> Result<Refund, PaymentError> {
        let refund = sqlx::query_as::<_, Refund>(
            "UPDATE refunds SET status = $2 WHERE id = $1 RETURNING *",
        )
        .bind(refund_id)
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await?;
        Ok(refund)
    }

    pub async fn find_dispute(
        &self,
        tx: &mut PgConnection,
        tenant_id: &str,
        psp: &str,
        psp_dispute_id: &str,
    ) -> Result<Option<Dispute>, PaymentError> {
        let dispute = sqlx::query_as::<_, Dispute>(
            "SELECT * FROM disputes WHERE tenant_id = $1 AND psp = $2 AND psp_dispute_id = $3",
        )
        .bind(tenant_id)
        .bind(psp)
        .bind(psp_dispute_id)
        .fetch_optional(&mut *tx)
        .await?;
        Ok(dispute)
    }

    pub async fn insert_dispute(
        &self,
        tx: &mut PgConnection,
        tenant_id: &str,
        payment_id: Uuid,
        psp: &str,
        psp_dispute_id: &str,
    ) -> Result<Dispute, PaymentError> {
        let now = Utc::now();
        let dispute = sqlx::query_as::<_, Dispute>(
            r#"
            INSERT INTO disputes (
                id, tenant_id, payment_id, psp, psp_dispute_id, status,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(payment_id)
        .bind(psp)
        .bind(psp_dispute_id)
        .bind(DisputeStatus::Opened.as_str())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        Ok(dispute)
    }

    pub async fn update_dispute_status(
        &self,
        tx: &mut PgConnection,
        dispute_id: Uuid,
        status: DisputeStatus,
    ) -> Result<Dispute, PaymentError> {
        let dispute = sqlx::query_as::<_, Dispute>(
            "UPDATE disputes SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(dispute_id)
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await?;
        Ok(dispute)
    }

    /// Records a webhook delivery for `(provider, event_id)`, returning
    /// `true` if this is the first time it's been seen. Provider-initiated
    /// retries of the same event are expected and must be no-ops
    /// (`spec.md` §4.7: "deduplicate by (provider, event_id)").
    pub async fn record_webhook_if_new(
        &self,
        tx: &mut PgConnection,
        provider: &str,
        event_id: &str,
        signature: &str,
        raw_payload: &[u8],
    ) -> Result<bool, PaymentError> {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_inbox (provider, event_id, signature, raw_payload, processed_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(provider)
        .bind(event_id)
        .bind(signature)
        .bind(raw_payload)
        .execute(&mut *tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
