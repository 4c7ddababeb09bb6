use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use saga_bus::{BusMessage, BusProducer};
use saga_core::{backoff, Clock};
use saga_outbox::{OutboxRow, OutboxStore};
use saga_runtime::notify_once::NotifyOnce;
use saga_runtime::task::Task;
use tokio::time::MissedTickBehavior;
use tracing::{info, instrument, warn};

use crate::config::OutboxPublisherConfig;

/// Drains [`OutboxStore`] rows to the bus with at-least-once semantics,
/// per-tenant concurrency, and exponential backoff on failure
/// (`spec.md` §4.2).
pub struct OutboxPublisher<P> {
    store: OutboxStore,
    producer: Arc<P>,
    config: OutboxPublisherConfig,
    clock: Arc<dyn Clock>,
}

impl<P: BusProducer + 'static> OutboxPublisher<P> {
    pub fn new(
        store: OutboxStore,
        producer: Arc<P>,
        config: OutboxPublisherConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            producer,
            config,
            clock,
        }
    }

    /// Spawns the control loop as a named, panic-propagating task. The loop
    /// model is "one cycle, then delay, then repeat" — `MissedTickBehavior::
    /// Delay` ensures an overlapping prior cycle can never start before the
    /// previous one completes (`spec.md` §4.2 "Backpressure").
    pub fn spawn(self, mut shutdown: NotifyOnce) -> Task<()> {
        Task::spawn("outbox-publisher", async move {
            let mut ticker = tokio::time::interval(self.config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = shutdown.recv() => {
                        info!("outbox publisher shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                }
            }
        })
    }

    #[instrument(skip_all, name = "outbox_publisher.tick")]
    async fn run_once(&self) {
        let now = self.clock.now();

        let tenants = if !self.config.static_tenants.is_empty() {
            self.config.static_tenants.clone()
        } else {
            match self.store.discover_tenants(now).await {
                Ok(tenants) => tenants,
                Err(error) => {
                    warn!(%error, "tenant discovery failed");
                    return;
                }
            }
        };

        stream::iter(tenants)
            .for_each_concurrent(self.config.max_concurrent_tenants, |tenant| async move {
                self.drain_tenant(&tenant, now).await;
            })
            .await;
    }

    #[instrument(skip(self), name = "outbox_publisher.drain_tenant", fields(tenant_id = %tenant))]
    async fn drain_tenant(&self, tenant: &str, now: DateTime<Utc>) {
        if let Err(error) = self.store.release_expired(tenant, now).await {
            warn!(%error, "failed to release expired leases");
        }

        let rows = match self
            .store
            .claim_batch(tenant, self.config.batch_size, self.config.lease_duration, now)
            .await
        {
            Ok(rows) => rows,
            Err(error) => {
                warn!(%error, "claim_batch failed");
                return;
            }
        };

        if rows.is_empty() {
            return;
        }

        let mut published = Vec::with_capacity(rows.len());
        let mut failed = Vec::new();

        for row in &rows {
            let message = Self::to_bus_message(row);
            match self.producer.send(&self.config.events_topic, message).await {
                Ok(()) => published.push((row.id, row.created_on)),
                Err(error) => {
                    warn!(%error, row_id = %row.id, "failed to publish outbox row");
                    failed.push(row);
                }
            }
        }

        if !published.is_empty() {
            if let Err(error) = self.store.delete(&published).await {
                warn!(%error, "failed to delete published rows");
            }
        }

        for row in failed {
            let next_try = now
                + chrono::Duration::from_std(backoff::next_delay(
                    self.config.base_backoff,
                    self.config.max_backoff,
                    (row.attempts + 1) as u32,
                ))
                .unwrap_or_default();
            if let Err(error) = self
                .store
                .reschedule_for_retry(&[(row.id, row.created_on)], next_try)
                .await
            {
                warn!(%error, row_id = %row.id, "failed to reschedule row for retry");
            }
        }
    }

    /// Serializes a claimed row into a bus record (`spec.md` §4.2 step 3):
    /// keyed by `OutboxRow::bus_key`, headers copied verbatim plus
    /// `tenant-id`/`saga-id`/`event-type` always set.
    fn to_bus_message(row: &OutboxRow) -> BusMessage {
        let mut message = BusMessage::new(row.bus_key(), row.payload.clone());
        message.headers = row.headers();
        message
            .headers
            .insert("tenant-id".to_string(), row.tenant_id.clone());
        message
            .headers
            .insert("saga-id".to_string(), row.saga_id.to_string());
        message
            .headers
            .insert("event-type".to_string(), row.event_type.clone());
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_row() -> OutboxRow {
        let now = Utc::now();
        OutboxRow {
            id: Uuid::new_v4(),
            created_on: now.date_naive(),
            tenant_id: "acme".to_string(),
            saga_id: Uuid::new_v4(),
            aggregate_type: "ORDER".to_string(),
            aggregate_id: Some("order-1".to_string()),
            event_type: "ORDER_CREATE".to_string(),
            event_key: Some("order/1".to_string()),
            payload: b"{\"type\":\"ORDER_CREATE\"}".to_vec(),
            headers_json: serde_json::json!({"correlation-id": "corr-1"}),
            attempts: 0,
            lease_until: None,
            created_at: now,
            updated_at: now,
            idem_key: None,
        }
    }

    #[test]
    fn bus_message_carries_stored_headers_plus_required_ones() {
        let row = sample_row();
        let message = OutboxPublisher::<saga_bus::InMemoryBus>::to_bus_message(&row);

        assert_eq!(message.key, "order/1");
        assert_eq!(message.payload, row.payload);
        assert_eq!(message.headers.get("correlation-id").unwrap(), "corr-1");
        assert_eq!(message.headers.get("tenant-id").unwrap(), "acme");
        assert_eq!(message.headers.get("saga-id").unwrap(), &row.saga_id.to_string());
        assert_eq!(message.headers.get("event-type").unwrap(), "ORDER_CREATE");
    }
}
