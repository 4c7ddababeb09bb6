use std::sync::Arc;

use saga_facade::SagaFacade;
use saga_live::LiveStatusBus;
use saga_payments::{IdempotencyStore, PaymentStateMachine};
use saga_status::SagaStatusStore;

/// Shared handles every axum handler needs. Cheap to clone — everything
/// inside is already an `Arc` or a `sqlx::PgPool` (itself a cheap-to-clone
/// connection pool handle).
#[derive(Clone)]
pub struct AppState {
    pub facade: Arc<SagaFacade>,
    pub machine: Arc<PaymentStateMachine>,
    pub idempotency: Arc<IdempotencyStore>,
    pub status_store: SagaStatusStore,
    pub live_bus: Arc<LiveStatusBus>,
    pub webhook_secret: Arc<str>,
}
