//! In-memory session store.
//!
//! Maps an opaque session token to the room it was issued for. Entries
//! expire after a fixed TTL and are never updated or revoked.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

/// A freshly issued session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque token handed to the client (cookie value).
    pub token: String,
    /// Room the token may control. Never changes.
    pub room: String,
    pub issued_at: DateTime<Utc>,
    pub ttl: Duration,
}

#[derive(Debug)]
struct Entry {
    room: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Thread-safe token → room table.
///
/// Cheap to clone; all clones share the same table.
#[derive(Debug, Clone)]
pub struct SessionStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    ttl: Duration,
}

impl SessionStore {
    /// Creates an empty store whose sessions live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Issues a new token bound to a new room.
    pub fn create(&self) -> Session {
        let token = generate_id();
        let room = generate_id();

        let entry = Entry {
            room: room.clone(),
            expires_at: Instant::now() + self.ttl,
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.clone(), entry);

        tracing::debug!(room = %room, "Session created");

        Session {
            token,
            room,
            issued_at: Utc::now(),
            ttl: self.ttl,
        }
    }

    /// Returns the room bound to `token`, if the session is still live.
    pub fn lookup(&self, token: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(token)
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.room.clone())
    }

    /// Removes expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Spawns a task that purges expired sessions every `interval` until
    /// `cancel` fires.
    pub fn spawn_sweeper(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let store = self.clone();

        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = store.purge_expired();
                        if removed > 0 {
                            tracing::debug!(removed, "Expired sessions swept");
                        }
                    }
                    () = cancel.cancelled() => break,
                }
            }
            tracing::debug!("Session sweeper stopped");
        })
    }
}

/// Generates a random 128-bit identifier, hex encoded.
pub fn generate_id() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Longest room id accepted from a request path.
pub const MAX_ROOM_ID_LEN: usize = 64;

/// Whether `room` is usable as a room id in pages and URLs.
///
/// Accepts ASCII letters, digits, `-` and `_`. Every id from
/// [`generate_id`] passes.
pub fn is_room_id(room: &str) -> bool {
    !room.is_empty()
        && room.len() <= MAX_ROOM_ID_LEN
        && room
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(2 * 60 * 60);

    #[test]
    fn test_generate_id_shape() {
        let id = generate_id();

        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, generate_id());
        assert!(is_room_id(&id));
    }

    #[test]
    fn test_room_id_alphabet() {
        assert!(is_room_id("some-room"));
        assert!(is_room_id("Room_2"));
        assert!(!is_room_id(""));
        assert!(!is_room_id("x');alert(document.cookie);//"));
        assert!(!is_room_id("a b"));
        assert!(!is_room_id("<script>"));
        assert!(!is_room_id(&"a".repeat(MAX_ROOM_ID_LEN + 1)));
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let store = SessionStore::new(TTL);
        let session = store.create();

        assert_ne!(session.token, session.room);
        assert_eq!(session.ttl, TTL);
        assert_eq!(store.ttl(), TTL);
        assert_eq!(store.lookup(&session.token), Some(session.room.clone()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let store = SessionStore::new(TTL);
        let a = store.create();
        let b = store.create();

        assert_ne!(a.token, b.token);
        assert_ne!(a.room, b.room);
        assert_eq!(store.lookup(&a.token), Some(a.room));
        assert_eq!(store.lookup(&b.token), Some(b.room));
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let store = SessionStore::new(TTL);
        let session = store.create();

        assert_eq!(store.lookup("not-a-token"), None);
        // A room id is not a token.
        assert_eq!(store.lookup(&session.room), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry() {
        let store = SessionStore::new(TTL);
        let session = store.create();

        time::advance(TTL - Duration::from_secs(1)).await;
        assert!(store.lookup(&session.token).is_some());

        time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.lookup(&session.token), None);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_keeps_live_sessions() {
        let store = SessionStore::new(TTL);
        let old = store.create();
        time::advance(TTL / 2).await;
        let fresh = store.create();
        time::advance(TTL / 2).await;

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.lookup(&old.token), None);
        assert_eq!(store.lookup(&fresh.token), Some(fresh.room));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_and_stops() {
        let store = SessionStore::new(Duration::from_secs(60));
        let _session = store.create();
        let cancel = CancellationToken::new();
        let handle = store.spawn_sweeper(Duration::from_secs(30), cancel.clone());

        time::sleep(Duration::from_secs(95)).await;
        assert_eq!(store.entries.read().unwrap().len(), 0);

        cancel.cancel();
        handle.await.unwrap();
    }
}
