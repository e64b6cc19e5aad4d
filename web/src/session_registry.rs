use dashmap::DashMap;
use google_auth::session::SessionStore;
use log::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

struct Entry {
    store: Arc<SessionStore>,
    last_seen: Instant,
}

/// Live sign-in sessions, keyed by the id kept in the session cookie.
///
/// Entries idle longer than the cookie expiry are unreachable and get pruned on access.
pub struct SessionRegistry {
    sessions: DashMap<Uuid, Entry>,
    state_ttl: chrono::Duration,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(state_ttl: chrono::Duration, idle_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            state_ttl,
            idle_timeout,
        }
    }

    /// The store for `session_id`, created on first use.
    pub fn resolve(&self, session_id: Uuid) -> Arc<SessionStore> {
        self.prune_idle();

        let mut entry = self.sessions.entry(session_id).or_insert_with(|| {
            debug!("Creating sign-in session {session_id}");
            Entry {
                store: Arc::new(SessionStore::with_state_ttl(self.state_ttl)),
                last_seen: Instant::now(),
            }
        });
        entry.last_seen = Instant::now();
        Arc::clone(&entry.store)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn prune_idle(&self) {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, entry| entry.last_seen.elapsed() < self.idle_timeout);
        let pruned = before.saturating_sub(self.sessions.len());
        if pruned > 0 {
            debug!("Pruned {pruned} idle sign-in sessions");
        }
    }
}
