//! Server-sent event encoding for relay output.
//!
//! Events use the Datastar signal-patch framing the frontend listens for:
//! `event: datastar-patch-signals` with `data: signals <json>`.

use std::convert::Infallible;

use axum::response::sse::Event;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::relay::RelayEvent;

/// SSE event name for signal patches.
pub const PATCH_SIGNALS_EVENT: &str = "datastar-patch-signals";

/// Buffered events per stream between the relay task and the response body.
pub const STREAM_BUFFER: usize = 16;

/// Encodes one relay event as an SSE event.
pub fn encode(event: &RelayEvent) -> serde_json::Result<Event> {
    let json = event.to_json()?;
    Ok(Event::default()
        .event(PATCH_SIGNALS_EVENT)
        .data(format!("signals {}", json)))
}

/// Turns the relay's channel into an SSE body stream.
///
/// The stream ends when the relay drops its sender; dropping the stream
/// (client gone) is what the relay sees as its sink closing.
pub fn event_stream(
    rx: mpsc::Receiver<RelayEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    ReceiverStream::new(rx).filter_map(|event| match encode(&event) {
        Ok(sse) => Some(Ok(sse)),
        Err(e) => {
            tracing::warn!(?e, "Failed to encode relay event");
            None
        }
    })
}
