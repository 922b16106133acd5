//! Shared application state for the HTTP server.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::bus::Bus;
use crate::config::Config;
use crate::ingress::ControllerIngress;
use crate::needs::NeedsState;
use crate::server::view::{HtmlRenderer, RoomRenderer};
use crate::session::{AuthorizationGate, SessionStore};

/// Application state shared across all handlers.
///
/// The session store and bus are built once here and handed to every
/// component that needs them.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: SessionStore,
    /// Room updates, keyed by room id.
    pub bus: Bus<NeedsState>,
    pub gate: AuthorizationGate,
    pub ingress: ControllerIngress,
    pub renderer: Arc<dyn RoomRenderer>,
    /// Cancelled on shutdown; every stream hangs off a child of it.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Creates app state with the built-in HTML renderer.
    pub fn new(config: Config, shutdown: CancellationToken) -> Self {
        let sessions = SessionStore::new(config.session_ttl);
        let bus = Bus::new(config.subscriber_capacity);
        let gate = AuthorizationGate::new(sessions.clone());
        let ingress = ControllerIngress::new(gate.clone(), bus.clone());

        Self {
            config: Arc::new(config),
            sessions,
            bus,
            gate,
            ingress,
            renderer: Arc::new(HtmlRenderer),
            shutdown,
        }
    }

    /// Replaces the page renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn RoomRenderer>) -> Self {
        self.renderer = renderer;
        self
    }
}
