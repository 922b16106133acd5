//! Public room endpoints: the viewer page and its event stream.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{sse::Event, Html, Sse},
};
use futures::Stream;
use tokio::sync::mpsc;

use crate::needs::NeedsState;
use crate::relay::Relay;
use crate::server::state::AppState;
use crate::server::stream::{event_stream, STREAM_BUFFER};
use crate::session::{is_room_id, Denial};

/// GET /:room_id - Read-only room page. No session required.
///
/// Ids outside the room id alphabet are never rendered.
pub async fn view_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Html<String>, (StatusCode, String)> {
    if !is_room_id(&room_id) {
        tracing::debug!(room = %room_id, "Rejected invalid room id");
        return Err((StatusCode::NOT_FOUND, Denial::UnknownSession.to_string()));
    }
    Ok(Html(state.renderer.render_room(&room_id, &NeedsState::baseline())))
}

/// GET /:room_id/connect - Live event stream for a room.
///
/// Anyone may listen. The relay task owns the room subscription and ends
/// when the client disconnects or the server shuts down.
pub async fn open_stream(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, &'static str)> {
    let relay = Relay::attach(
        &state.bus,
        &room_id,
        NeedsState::baseline(),
        state.config.heartbeat_interval,
    )
    .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Failed to connect"))?;

    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    tokio::spawn(relay.run(tx, state.shutdown.child_token()));

    Ok(Sse::new(event_stream(rx)))
}
