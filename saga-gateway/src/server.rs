use axum::middleware;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::claims::claims_stub_layer;
use crate::routes;
use crate::state::AppState;

pub fn build(state: AppState) -> Router<()> {
    routes::router(state)
        .layer(middleware::from_fn(claims_stub_layer))
        .layer(TraceLayer::new_for_http())
}
