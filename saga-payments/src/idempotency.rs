//! Request-level idempotency keyed by a caller-supplied token
//! (`spec.md` §3, §4.9).

use std::future::Future;

use saga_core::hash::{canonical_json_sha256, sha256_hex};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{PgPool, Row};

use crate::error::PaymentError;

pub struct IdempotencyStore {
    pool: PgPool,
}

impl IdempotencyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs `action` at most once per `(tenant, key)`. Concurrent or
    /// repeated callers with the same key and request body replay the
    /// stored response; a differing body is a `Conflict`; a request still
    /// being processed by its writer is `InProgress` (`spec.md` §4.9).
    #[tracing::instrument(skip_all, name = "idempotency.execute", fields(tenant_id))]
    pub async fn execute<T, F, Fut>(
        &self,
        tenant_id: &str,
        key: &str,
        request: &serde_json::Value,
        action: F,
    ) -> Result<T, PaymentError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(T, u16), PaymentError>>,
    {
        let key_hash = sha256_hex(key.as_bytes());
        let fingerprint = canonical_json_sha256(request);

        let inserted = sqlx::query(
            r#"
            INSERT INTO idempotency_request (key_hash, request_fingerprint, tenant_id, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            ON CONFLICT (key_hash) DO NOTHING
            "#,
        )
        .bind(&key_hash)
        .bind(&fingerprint)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 1 {
            return self.run_as_writer(&key_hash, action).await;
        }

        let row = sqlx::query(
            r#"
            SELECT request_fingerprint, response_bytes, status_code
            FROM idempotency_request
            WHERE key_hash = $1
            "#,
        )
        .bind(&key_hash)
        .fetch_one(&self.pool)
        .await?;

        let stored_fingerprint: String = row.try_get("request_fingerprint")?;
        if stored_fingerprint != fingerprint {
            return Err(PaymentError::Conflict(format!(
                "idempotency key {key} reused with a different request"
            )));
        }

        let response_bytes: Option<Vec<u8>> = row.try_get("response_bytes")?;
        match response_bytes {
            Some(bytes) => {
                let response: T = serde_json::from_slice(&bytes).map_err(|error| {
                    PaymentError::Invariant(format!("corrupt idempotency response: {error}"))
                })?;
                Ok(response)
            }
            None => Err(PaymentError::InProgress),
        }
    }

    /// We won the insert race, so we're responsible for running `action`
    /// and storing its result. A writer failure leaves the placeholder row
    /// in place — other callers observe `InProgress` until a retry
    /// succeeds (`spec.md` §4.9: "Writer failures leave the placeholder row").
    async fn run_as_writer<T, F, Fut>(&self, key_hash: &str, action: F) -> Result<T, PaymentError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(T, u16), PaymentError>>,
    {
        let (response, status_code) = action().await?;
        let bytes = serde_json::to_vec(&response)
            .map_err(|error| PaymentError::Invariant(format!("unserializable response: {error}")))?;

        sqlx::query(
            r#"
            UPDATE idempotency_request
            SET response_bytes = $2, status_code = $3, updated_at = NOW()
            WHERE key_hash = $1
            "#,
        )
        .bind(key_hash)
        .bind(bytes)
        .bind(i32::from(status_code))
        .execute(&self.pool)
        .await?;

        Ok(response)
    }
}
