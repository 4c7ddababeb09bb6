use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use saga_core::SagaId;
use saga_live::LiveStatusBus;
use saga_outbox::OutboxStore;
use saga_status::{SagaState, SagaStatus, SagaStatusStore};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::FacadeError;

#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderLine {
    pub sku: String,
    pub quantity: i64,
    pub unit_price_minor: i64,
}

pub struct StartOrderCreate {
    pub tenant_id: String,
    pub user_id: String,
    pub lines: Vec<OrderLine>,
    pub total_minor: i64,
    pub currency_code: String,
    pub correlation_id: Option<String>,
    pub idempotency_key: Option<String>,
}

/// Seeds a brand-new saga and hands it off to the rest of the system via
/// the outbox (`spec.md` §4.6). The order itself has no dedicated table
/// here — its id is the saga id, and its lifecycle from this point on is
/// entirely observable through `saga_status`/the live stream.
pub struct SagaFacade {
    pool: PgPool,
    status_store: SagaStatusStore,
    live_bus: Arc<LiveStatusBus>,
    outbox: OutboxStore,
}

impl SagaFacade {
    pub fn new(
        pool: PgPool,
        status_store: SagaStatusStore,
        live_bus: Arc<LiveStatusBus>,
        outbox: OutboxStore,
    ) -> Self {
        Self {
            pool,
            status_store,
            live_bus,
            outbox,
        }
    }

    #[tracing::instrument(skip_all, name = "facade.start_order_create", fields(tenant_id = %cmd.tenant_id))]
    pub async fn start_order_create(&self, cmd: StartOrderCreate) -> Result<Uuid, FacadeError> {
        let saga_id = SagaId::generate().as_uuid();
        let now = Utc::now();

        let seed = SagaStatus {
            id: saga_id,
            tenant_id: cmd.tenant_id.clone(),
            user_id: cmd.user_id.clone(),
            saga_type: "ORDER_CREATE".to_string(),
            state: SagaState::Started.as_str().to_string(),
            reason: None,
            created_at: now,
            updated_at: now,
        };
        let seeded = self.status_store.upsert(&seed).await?;
        self.live_bus.publish(seeded);

        match self.write_creation_event(&cmd, saga_id).await {
            Ok(()) => Ok(saga_id),
            Err(error) => {
                let reason = format!("command_publish_failed:{}", error.class());
                if let Ok(Some(failed)) = self
                    .status_store
                    .update_state_and_reason(saga_id, "FAILED", Some(&reason))
                    .await
                {
                    self.live_bus.publish(failed);
                }
                Err(error)
            }
        }
    }

    async fn write_creation_event(
        &self,
        cmd: &StartOrderCreate,
        saga_id: Uuid,
    ) -> Result<(), FacadeError> {
        let mut headers = BTreeMap::new();
        headers.insert("tenant-id".to_string(), cmd.tenant_id.clone());
        headers.insert("user-id".to_string(), cmd.user_id.clone());
        if let Some(correlation_id) = &cmd.correlation_id {
            headers.insert("correlation-id".to_string(), correlation_id.clone());
        }
        if let Some(idempotency_key) = &cmd.idempotency_key {
            headers.insert("idempotency-key".to_string(), idempotency_key.clone());
        }

        let payload = serde_json::json!({
            "type": "ORDER_CREATE",
            "sagaId": saga_id,
            "tenantId": cmd.tenant_id,
            "userId": cmd.user_id,
            "lines": cmd.lines,
            "totalMinor": cmd.total_minor,
            "currencyCode": cmd.currency_code,
        });

        let mut tx = self.pool.begin().await.map_err(saga_outbox::OutboxError::from)?;
        self.outbox
            .insert(
                &mut tx,
                &cmd.tenant_id,
                Some(saga_id),
                "ORDER",
                Some(&saga_id.to_string()),
                "ORDER_CREATE",
                Some(&saga_id.to_string()),
                serde_json::to_vec(&payload).unwrap_or_default(),
                headers,
            )
            .await?;
        tx.commit().await.map_err(saga_outbox::OutboxError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_create_payload_is_constructible() {
        let cmd = StartOrderCreate {
            tenant_id: "acme".to_string(),
            user_id: "u-1".to_string(),
            lines: vec![OrderLine {
                sku: "sku-1".to_string(),
                quantity: 2,
                unit_price_minor: 500,
            }],
            total_minor: 1000,
            currency_code: "USD".to_string(),
            correlation_id: Some("corr-1".to_string()),
            idempotency_key: None,
        };
        assert_eq!(cmd.lines.len(), 1);
        assert_eq!(cmd.lines[0].quantity * cmd.lines[0].unit_price_minor, cmd.total_minor);
    }
}
