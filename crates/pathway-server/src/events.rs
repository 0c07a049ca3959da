//! Server-sent stream of routing events

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::Stream;
use futures_util::stream;
use pathway_routing::RoutingEvent;
use tokio::sync::broadcast::error::RecvError;

use crate::routes::AppState;

/// Handle `GET /v1/events`
///
/// Each routing event becomes one SSE message named after its type.
/// Slow subscribers skip what they missed and keep going.
pub async fn events_handler(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.router_state().subscribe();

    let events = stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => return Some((Ok(to_sse(&event)), receiver)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

fn to_sse(event: &RoutingEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_default();
    Event::default().event(event.kind()).data(data)
}
