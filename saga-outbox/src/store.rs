use std::collections::BTreeMap;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use saga_core::{SagaId, TenantId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::OutboxError;
use crate::row::OutboxRow;

/// Durable persistence and atomic claim of outbox rows (`spec.md` §4.1).
#[derive(Clone)]
pub struct OutboxStore {
    pool: PgPool,
}

impl OutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a new outbox row within `tx`. The caller is responsible for
    /// committing `tx` atomically with whatever business-logic write this
    /// event is reporting — that's the whole point of the pattern.
    ///
    /// If `saga_id` is `None`, one is derived deterministically from
    /// `tenant_id | aggregate_type | event_key` (`spec.md` §4.1).
    #[tracing::instrument(skip_all, name = "outbox.insert", fields(tenant_id, event_type = %event_type))]
    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        &self,
        tx: &mut sqlx::PgConnection,
        tenant_id: &str,
        saga_id: Option<Uuid>,
        aggregate_type: &str,
        aggregate_id: Option<&str>,
        event_type: &str,
        event_key: Option<&str>,
        payload: Vec<u8>,
        headers: BTreeMap<String, String>,
    ) -> Result<OutboxRow, OutboxError> {
        let saga_id = saga_id.unwrap_or_else(|| {
            SagaId::derive(
                &TenantId::from(tenant_id),
                aggregate_type,
                event_key.unwrap_or_default(),
            )
            .as_uuid()
        });
        let id = Uuid::new_v4();
        let now = Utc::now();
        let created_on = now.date_naive();
        let headers_json = serde_json::to_value(&headers).unwrap_or(serde_json::Value::Null);

        let row = sqlx::query_as::<_, OutboxRow>(
            r#"
            INSERT INTO outbox (
                id, created_on, tenant_id, saga_id, aggregate_type, aggregate_id,
                event_type, event_key, payload, headers_json, attempts, lease_until,
                created_at, updated_at, idem_key
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 0, NULL, $11, $11, NULL)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(created_on)
        .bind(tenant_id)
        .bind(saga_id)
        .bind(aggregate_type)
        .bind(aggregate_id)
        .bind(event_type)
        .bind(event_key)
        .bind(payload)
        .bind(headers_json)
        .bind(now)
        .fetch_one(tx)
        .await?;

        Ok(row)
    }

    /// Atomically claims up to `limit` claimable rows for `tenant_id`,
    /// ordered `(created_at, id)` ascending, setting
    /// `lease_until := now + lease_duration`. Implemented as a single
    /// `SELECT ... FOR UPDATE SKIP LOCKED` CTE driving an `UPDATE ...
    /// RETURNING`, so concurrent workers scanning the same tenant never
    /// receive overlapping rows (`spec.md` §4.1).
    #[tracing::instrument(skip(self), name = "outbox.claim_batch", fields(tenant_id, limit))]
    pub async fn claim_batch(
        &self,
        tenant_id: &str,
        limit: i64,
        lease_duration: std::time::Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<OutboxRow>, OutboxError> {
        let lease_until = now + ChronoDuration::from_std(lease_duration).unwrap_or_default();
        let rows = sqlx::query_as::<_, OutboxRow>(
            r#"
            WITH claimable AS (
                SELECT id, created_on
                FROM outbox
                WHERE tenant_id = $1
                  AND (lease_until IS NULL OR lease_until < $2)
                ORDER BY created_at ASC, id ASC
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            UPDATE outbox
            SET lease_until = $4
            FROM claimable
            WHERE outbox.id = claimable.id AND outbox.created_on = claimable.created_on
            RETURNING outbox.*
            "#,
        )
        .bind(tenant_id)
        .bind(now)
        .bind(limit)
        .bind(lease_until)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Returns rows eligible for a fresh claim, i.e. the distinct set of
    /// tenants with a `NULL` or expired lease (`spec.md` §4.2 tenant
    /// discovery fallback).
    #[tracing::instrument(skip(self), name = "outbox.discover_tenants")]
    pub async fn discover_tenants(&self, now: DateTime<Utc>) -> Result<Vec<String>, OutboxError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT tenant_id
            FROM outbox
            WHERE lease_until IS NULL OR lease_until < $1
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(tenant_id,)| tenant_id).collect())
    }

    /// Increments `attempts` and sets `lease_until := next_try` for the
    /// given `(id, created_on)` keys.
    #[tracing::instrument(skip(self, keys), name = "outbox.reschedule_for_retry", fields(count = keys.len()))]
    pub async fn reschedule_for_retry(
        &self,
        keys: &[(Uuid, NaiveDate)],
        next_try: DateTime<Utc>,
    ) -> Result<u64, OutboxError> {
        let mut affected = 0u64;
        for (id, created_on) in keys {
            let result = sqlx::query(
                r#"
                UPDATE outbox
                SET attempts = attempts + 1, lease_until = $3, updated_at = NOW()
                WHERE id = $1 AND created_on = $2
                "#,
            )
            .bind(id)
            .bind(created_on)
            .bind(next_try)
            .execute(&self.pool)
            .await?;
            affected += result.rows_affected();
        }
        Ok(affected)
    }

    /// Clears expired leases for crash recovery: a worker that died
    /// mid-batch leaves `lease_until` set, and the next tick reclaims the
    /// row without incrementing `attempts` (`spec.md` §4.2 "Crash safety").
    #[tracing::instrument(skip(self), name = "outbox.release_expired", fields(tenant_id))]
    pub async fn release_expired(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, OutboxError> {
        let result = sqlx::query(
            r#"
            UPDATE outbox
            SET lease_until = NULL, updated_at = NOW()
            WHERE tenant_id = $1 AND lease_until IS NOT NULL AND lease_until < $2
            "#,
        )
        .bind(tenant_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Deletes the given `(id, created_on)` keys, post-publish.
    #[tracing::instrument(skip(self, keys), name = "outbox.delete", fields(count = keys.len()))]
    pub async fn delete(&self, keys: &[(Uuid, NaiveDate)]) -> Result<u64, OutboxError> {
        let mut affected = 0u64;
        for (id, created_on) in keys {
            let result = sqlx::query("DELETE FROM outbox WHERE id = $1 AND created_on = $2")
                .bind(id)
                .bind(created_on)
                .execute(&self.pool)
                .await?;
            affected += result.rows_affected();
        }
        Ok(affected)
    }
}

/// Creates the date-keyed child partitions for `today .. today + days_ahead`
/// ahead of time, so an insert never races a missing partition
/// (`spec.md` §4 "partitions are created ahead of time").
#[tracing::instrument(skip(pool), name = "outbox.ensure_partitions")]
pub async fn ensure_partitions(
    pool: &PgPool,
    today: NaiveDate,
    days_ahead: i64,
) -> Result<(), OutboxError> {
    for offset in 0..=days_ahead {
        let day = today + ChronoDuration::days(offset);
        let next_day = day + ChronoDuration::days(1);
        let suffix = day.format("%Y_%m_%d");
        let statement = format!(
            r#"CREATE TABLE IF NOT EXISTS outbox_{suffix}
               PARTITION OF outbox
               FOR VALUES FROM ('{day}') TO ('{next_day}')"#,
        );
        sqlx::query(&statement).execute(pool).await?;
    }
    Ok(())
}
