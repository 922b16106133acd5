//! Streaming relay for one viewer connection.
//!
//! A relay goes through `Attaching -> Streaming -> Closed` exactly once:
//! it subscribes to the room's topic, sends a baseline snapshot, then
//! forwards bus payloads and periodic heartbeats until the client goes
//! away, a write fails, the bus shuts down or the caller cancels. The
//! subscription is released on every one of those paths.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::bus::{Bus, BusError, Subscription};
use crate::needs::{Heartbeat, NeedsState};

/// A payload pushed to a viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEvent {
    /// Baseline sent once, before anything from the bus.
    Snapshot(NeedsState),
    /// A controller update received from the bus.
    Update(NeedsState),
    Heartbeat(Heartbeat),
}

impl RelayEvent {
    /// JSON body of the event as seen by the client.
    pub fn to_json(&self) -> serde_json::Result<String> {
        match self {
            RelayEvent::Snapshot(needs) | RelayEvent::Update(needs) => serde_json::to_string(needs),
            RelayEvent::Heartbeat(beat) => serde_json::to_string(beat),
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        matches!(self, RelayEvent::Heartbeat(_))
    }
}

/// The outbound stream is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkClosed;

/// Outbound half of a viewer connection.
pub trait EventSink: Send + Sync {
    /// Writes one event. An error means the stream is dead.
    fn send(&self, event: RelayEvent) -> impl Future<Output = Result<(), SinkClosed>> + Send;

    /// Resolves once the client has gone away.
    fn closed(&self) -> impl Future<Output = ()> + Send;
}

impl EventSink for mpsc::Sender<RelayEvent> {
    async fn send(&self, event: RelayEvent) -> Result<(), SinkClosed> {
        mpsc::Sender::send(self, event).await.map_err(|_| SinkClosed)
    }

    async fn closed(&self) {
        mpsc::Sender::closed(self).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Attaching,
    Streaming,
    Closed,
}

/// What ended a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The snapshot could not be written.
    SnapshotFailed,
    /// The client disconnected.
    ClientGone,
    /// A forward or heartbeat write failed.
    WriteFailed,
    /// The caller cancelled (server shutdown).
    Cancelled,
    /// The bus ended the subscription.
    BusClosed,
}

/// Summary returned when a relay reaches `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    pub reason: CloseReason,
    pub forwarded: u64,
    pub heartbeats: u64,
}

/// Errors that prevent a relay from being established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayError {
    Subscribe(BusError),
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::Subscribe(e) => write!(f, "Failed to subscribe: {}", e),
        }
    }
}

impl std::error::Error for RelayError {}

enum Stop {
    Cancelled,
    WriteFailed,
}

impl From<Stop> for CloseReason {
    fn from(stop: Stop) -> Self {
        match stop {
            Stop::Cancelled => CloseReason::Cancelled,
            Stop::WriteFailed => CloseReason::WriteFailed,
        }
    }
}

/// Writes one event unless cancellation fires first.
async fn deliver<S: EventSink>(
    sink: &S,
    event: RelayEvent,
    cancel: &CancellationToken,
) -> Result<(), Stop> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Stop::Cancelled),
        sent = sink.send(event) => sent.map_err(|_| Stop::WriteFailed),
    }
}

/// One viewer's relay, owning its subscription.
#[derive(Debug)]
pub struct Relay {
    room: String,
    subscription: Subscription<NeedsState>,
    snapshot: NeedsState,
    heartbeat_interval: Duration,
    state: RelayState,
    forwarded: u64,
    heartbeats: u64,
}

impl Relay {
    /// Subscribes to `room` on the bus.
    ///
    /// Fails if the bus refuses the subscription; the relay then never
    /// streams.
    pub fn attach(
        bus: &Bus<NeedsState>,
        room: &str,
        snapshot: NeedsState,
        heartbeat_interval: Duration,
    ) -> Result<Self, RelayError> {
        let subscription = bus.subscribe(room).map_err(|e| {
            tracing::error!(room, ?e, "Failed to subscribe to room");
            RelayError::Subscribe(e)
        })?;

        tracing::info!(room, "Client connected to room");

        Ok(Self {
            room: room.to_string(),
            subscription,
            snapshot,
            heartbeat_interval,
            state: RelayState::Attaching,
            forwarded: 0,
            heartbeats: 0,
        })
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Drives the relay to completion, writing to `sink`.
    ///
    /// Returns once the relay is closed; the subscription has been
    /// released and `sink` dropped by then.
    pub async fn run<S: EventSink>(mut self, sink: S, cancel: CancellationToken) -> RelayOutcome {
        let reason = match deliver(&sink, RelayEvent::Snapshot(self.snapshot), &cancel).await {
            Ok(()) => {
                self.state = RelayState::Streaming;
                tracing::debug!(room = %self.room, "Snapshot sent, streaming");
                self.stream(&sink, &cancel).await
            }
            Err(Stop::WriteFailed) => {
                tracing::warn!(room = %self.room, "Failed to send initial snapshot");
                CloseReason::SnapshotFailed
            }
            Err(Stop::Cancelled) => CloseReason::Cancelled,
        };

        drop(sink);
        self.close(reason)
    }

    async fn stream<S: EventSink>(&mut self, sink: &S, cancel: &CancellationToken) -> CloseReason {
        let mut heartbeat = time::interval_at(
            Instant::now() + self.heartbeat_interval,
            self.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return CloseReason::Cancelled,
                () = sink.closed() => return CloseReason::ClientGone,
                payload = self.subscription.next() => {
                    let Some(needs) = payload else {
                        return CloseReason::BusClosed;
                    };
                    if let Err(stop) = deliver(sink, RelayEvent::Update(needs), cancel).await {
                        tracing::warn!(room = %self.room, "Failed to forward update");
                        return stop.into();
                    }
                    self.forwarded += 1;
                    tracing::trace!(room = %self.room, "Update forwarded");
                }
                _ = heartbeat.tick() => {
                    if let Err(stop) = deliver(sink, RelayEvent::Heartbeat(Heartbeat::now()), cancel).await {
                        tracing::warn!(room = %self.room, "Failed to send heartbeat");
                        return stop.into();
                    }
                    self.heartbeats += 1;
                    tracing::trace!(room = %self.room, "Heartbeat sent");
                }
            }
        }
    }

    fn close(&mut self, reason: CloseReason) -> RelayOutcome {
        self.subscription.unsubscribe();
        self.state = RelayState::Closed;

        tracing::info!(
            room = %self.room,
            ?reason,
            forwarded = self.forwarded,
            heartbeats = self.heartbeats,
            "Client disconnected from room"
        );

        RelayOutcome {
            reason,
            forwarded: self.forwarded,
            heartbeats: self.heartbeats,
        }
    }
}
