use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use saga_bus::{BusConsumer, BusError, EventCodec};
use saga_core::backoff;
use saga_live::LiveStatusBus;
use saga_runtime::notify_once::NotifyOnce;
use saga_runtime::task::Task;
use saga_status::{SagaState, SagaStatus, SagaStatusStore};
use tracing::{debug, info, instrument, warn};

const RECONNECT_BASE_BACKOFF: Duration = Duration::from_secs(1);
const RECONNECT_MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Consumes a single bus partition's worth of events sequentially (so
/// per-key ordering is preserved) and projects each into `saga_status`
/// (`spec.md` §4.3). Reconnects the consumer forever on transport errors,
/// with an infinite exponential backoff capped at one minute.
pub struct SagaEventProjector {
    status_store: SagaStatusStore,
    live_bus: Arc<LiveStatusBus>,
}

impl SagaEventProjector {
    pub fn new(status_store: SagaStatusStore, live_bus: Arc<LiveStatusBus>) -> Self {
        Self {
            status_store,
            live_bus,
        }
    }

    /// Runs the projector loop until `shutdown` fires. `connect` is called
    /// to (re)build the underlying consumer; it's invoked again, with
    /// backoff, every time the current consumer reports a transport error.
    pub fn spawn<C, F, Fut>(self: Arc<Self>, connect: F, mut shutdown: NotifyOnce) -> Task<()>
    where
        C: BusConsumer + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<C, BusError>> + Send,
    {
        Task::spawn("saga-event-projector", async move {
            let mut backoff_attempt: u32 = 0;
            loop {
                let mut consumer = tokio::select! {
                    biased;
                    () = shutdown.recv() => return,
                    result = connect() => match result {
                        Ok(consumer) => {
                            backoff_attempt = 0;
                            consumer
                        }
                        Err(error) => {
                            backoff_attempt += 1;
                            let delay = backoff::next_delay(
                                RECONNECT_BASE_BACKOFF,
                                RECONNECT_MAX_BACKOFF,
                                backoff_attempt,
                            );
                            warn!(%error, ?delay, "failed to connect bus consumer, retrying");
                            tokio::select! {
                                biased;
                                () = shutdown.recv() => return,
                                _ = tokio::time::sleep(delay) => {}
                            }
                            continue;
                        }
                    },
                };

                loop {
                    let next = tokio::select! {
                        biased;
                        () = shutdown.recv() => return,
                        next = consumer.recv() => next,
                    };

                    match next {
                        Ok(Some(incoming)) => {
                            self.process(&incoming.message).await;
                            if let Err(error) = consumer.commit(incoming.partition, incoming.offset).await {
                                warn!(%error, "failed to commit offset");
                            }
                        }
                        Ok(None) => {
                            info!("bus consumer closed, reconnecting");
                            break;
                        }
                        Err(error) => {
                            backoff_attempt += 1;
                            let delay = backoff::next_delay(
                                RECONNECT_BASE_BACKOFF,
                                RECONNECT_MAX_BACKOFF,
                                backoff_attempt,
                            );
                            warn!(%error, ?delay, "bus consumer error, reconnecting");
                            tokio::select! {
                                biased;
                                () = shutdown.recv() => return,
                                _ = tokio::time::sleep(delay) => {}
                            }
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Processes one record per `spec.md` §4.3 steps 1-6. Acknowledgement
    /// (step 7) is the caller's responsibility and happens regardless of
    /// whether this returns — a malformed or unprojectable event must not
    /// stall the partition.
    #[instrument(skip_all, name = "projector.process")]
    async fn process(&self, message: &saga_bus::BusMessage) {
        if message.payload.is_empty() {
            debug!("tombstone record, skipping");
            return;
        }

        let decoded = match EventCodec::decode(&message.payload, &message.headers) {
            Ok(decoded) => decoded,
            Err(error) => {
                warn!(%error, "malformed event, acknowledging without projecting");
                return;
            }
        };

        let state = SagaState::from_event_type(&decoded.event_type);
        let now = Utc::now();
        let entity = SagaStatus {
            id: decoded.saga_id.as_uuid(),
            tenant_id: decoded.tenant_id.as_str().to_string(),
            user_id: decoded.user_id.clone(),
            saga_type: decoded.event_type.clone(),
            state: state.as_str().to_string(),
            reason: decoded.reason.clone(),
            created_at: now,
            updated_at: now,
        };

        match self.status_store.upsert(&entity).await {
            Ok(projected) => self.live_bus.publish(projected),
            Err(error) => warn!(%error, saga_id = %decoded.saga_id, "failed to upsert saga status"),
        }
    }
}
