//! Controller writes: authorize, then publish to the room.

use crate::bus::Bus;
use crate::needs::NeedsState;
use crate::session::{AuthorizationGate, Denial};

/// An accepted controller write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    /// Viewers the update was queued for. Zero is not an error.
    pub delivered: usize,
}

/// Entry point for controller updates.
#[derive(Clone)]
pub struct ControllerIngress {
    gate: AuthorizationGate,
    bus: Bus<NeedsState>,
}

impl ControllerIngress {
    pub fn new(gate: AuthorizationGate, bus: Bus<NeedsState>) -> Self {
        Self { gate, bus }
    }

    /// Publishes `payload` to `room` if `token` controls it.
    ///
    /// Never waits on viewers. Nothing is published on denial.
    pub fn submit(
        &self,
        token: Option<&str>,
        room: &str,
        payload: NeedsState,
    ) -> Result<Accepted, Denial> {
        self.gate.authorize(token, room).map_err(|denial| {
            tracing::debug!(room, %denial, "Controller write rejected");
            denial
        })?;

        let delivered = self.bus.publish(room, payload);
        tracing::debug!(room, delivered, "Controller update published");

        Ok(Accepted { delivered })
    }
}
