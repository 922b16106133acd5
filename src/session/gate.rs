//! Controller authorization.

use super::store::SessionStore;

/// Why a caller may not control a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// No live session for the token (missing, unknown or expired).
    UnknownSession,
    /// The session is bound to a different room.
    Forbidden,
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Denial::UnknownSession => write!(f, "Unknown sim"),
            Denial::Forbidden => write!(f, "You don't have access to this sim"),
        }
    }
}

impl std::error::Error for Denial {}

/// Decides whether a token may act as controller for a room.
#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    sessions: SessionStore,
}

impl AuthorizationGate {
    pub fn new(sessions: SessionStore) -> Self {
        Self { sessions }
    }

    /// Checks `token` against `room`. Has no side effects.
    pub fn authorize(&self, token: Option<&str>, room: &str) -> Result<(), Denial> {
        let token = token.ok_or(Denial::UnknownSession)?;
        let bound_room = self.sessions.lookup(token).ok_or(Denial::UnknownSession)?;

        if bound_room == room {
            Ok(())
        } else {
            Err(Denial::Forbidden)
        }
    }
}
