mod payments;
mod sagas;
mod stream;
mod webhooks;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router<()> {
    Router::new()
        .route("/sagas/order-create", post(sagas::start_order_create))
        .route("/sagas/{id}/stream", get(stream::stream_saga))
        .route("/payments/authorize", post(payments::authorize))
        .route("/payments/{id}/capture", post(payments::capture))
        .route("/payments/{id}/refund", post(payments::refund))
        .route("/payments/{id}/disputes", post(payments::open_dispute))
        .route(
            "/payments/{id}/disputes/{psp_dispute_id}",
            post(payments::transition_dispute),
        )
        .route("/webhooks/{provider}", post(webhooks::ingest))
        .with_state(state)
}
