use sqlx::PgPool;
use uuid::Uuid;

use crate::entity::SagaStatus;
use crate::error::StatusError;

/// Storage for the `saga_status` projection (`spec.md` §4.4). No
/// cross-entity transactions are required — every operation is a single
/// row or a read query.
#[derive(Clone)]
pub struct SagaStatusStore {
    pool: PgPool,
}

impl SagaStatusStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), name = "saga_status.find_by_id")]
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<SagaStatus>, StatusError> {
        let row = sqlx::query_as::<_, SagaStatus>(
            r#"SELECT id, tenant_id, user_id, "type", state, reason, created_at, updated_at
               FROM saga_status WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[tracing::instrument(skip(self, entity), name = "saga_status.upsert", fields(id = %entity.id, state = %entity.state))]
    pub async fn upsert(&self, entity: &SagaStatus) -> Result<SagaStatus, StatusError> {
        let row = sqlx::query_as::<_, SagaStatus>(
            r#"
            INSERT INTO saga_status (id, tenant_id, user_id, "type", state, reason, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ON CONFLICT (id) DO UPDATE
                SET state = EXCLUDED.state,
                    reason = EXCLUDED.reason,
                    updated_at = EXCLUDED.updated_at
            RETURNING id, tenant_id, user_id, "type", state, reason, created_at, updated_at
            "#,
        )
        .bind(entity.id)
        .bind(&entity.tenant_id)
        .bind(&entity.user_id)
        .bind(&entity.saga_type)
        .bind(&entity.state)
        .bind(&entity.reason)
        .bind(entity.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    #[tracing::instrument(skip(self), name = "saga_status.update_state_and_reason", fields(%id, state))]
    pub async fn update_state_and_reason(
        &self,
        id: Uuid,
        state: &str,
        reason: Option<&str>,
    ) -> Result<Option<SagaStatus>, StatusError> {
        let row = sqlx::query_as::<_, SagaStatus>(
            r#"
            UPDATE saga_status
            SET state = $2, reason = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING id, tenant_id, user_id, "type", state, reason, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(state)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[tracing::instrument(skip(self), name = "saga_status.recent_by_tenant", fields(tenant_id, limit))]
    pub async fn recent_by_tenant(
        &self,
        tenant_id: &str,
        limit: i64,
    ) -> Result<Vec<SagaStatus>, StatusError> {
        let rows = sqlx::query_as::<_, SagaStatus>(
            r#"
            SELECT id, tenant_id, user_id, "type", state, reason, created_at, updated_at
            FROM saga_status
            WHERE tenant_id = $1
            ORDER BY updated_at DESC
            LIMIT $2
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[tracing::instrument(skip(self), name = "saga_status.by_tenant_and_state", fields(tenant_id, state))]
    pub async fn by_tenant_and_state(
        &self,
        tenant_id: &str,
        state: &str,
    ) -> Result<Vec<SagaStatus>, StatusError> {
        let rows = sqlx::query_as::<_, SagaStatus>(
            r#"
            SELECT id, tenant_id, user_id, "type", state, reason, created_at, updated_at
            FROM saga_status
            WHERE tenant_id = $1 AND state = $2
            ORDER BY updated_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(state)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[tracing::instrument(skip(self), name = "saga_status.exists")]
    pub async fn exists(&self, id: Uuid) -> Result<bool, StatusError> {
        let row: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM saga_status WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }
}
