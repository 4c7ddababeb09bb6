use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use uuid::Uuid;

use crate::state::AppState;

/// `GET /sagas/:id/stream` — the one piece of HTTP surface this core owns
/// directly (`spec.md` §4.5): a live status stream backed by
/// `LiveStatusBus::subscribe`, replaying the latest retained value first.
pub async fn stream_saga(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.live_bus.subscribe(id);
    let stream = futures::stream::unfold(subscription, |mut sub| async move {
        let status = sub.next().await?;
        let event = Event::default()
            .event(status.state.clone())
            .json_data(&status)
            .unwrap_or_else(|_| Event::default().data("{}"));
        Some((Ok(event), sub))
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
