//! Server-Sent Events support

use crate::session::SseEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert broadcast stream to SSE stream
pub fn sse_stream(
    init_event: SseEvent,
    broadcast_rx: tokio::sync::broadcast::Receiver<SseEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move { Ok(sse_event_to_axum(&init_event)) });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(sse_event_to_axum(&event))),
        Err(_) => None, // Skip lagged messages
    });

    Sse::new(init.chain(broadcasts)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn sse_event_to_axum(event: &SseEvent) -> Event {
    let name = event.event_name();
    Event::default().event(name).json_data(event).unwrap_or_else(|e| {
        tracing::warn!(event = name, error = %e, "Failed to serialize SSE event");
        Event::default()
            .event("error")
            .data(r#"{"type":"error","message":"event could not be encoded"}"#)
    })
}
