//! Server-side record of one user's authentication outcome.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Duration;
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tracing::{debug, info};

use crate::error::{oauth_error, Error, ErrorKind};
use crate::oauth::token::CredentialBundle;
use crate::oauth::{StateData, StateManager, UserProfile};

/// Most spent-code fingerprints a session remembers. The oldest is forgotten first.
pub const MAX_CONSUMED_CODES: usize = 64;

/// Fingerprints of codes a session has spent, oldest first.
#[derive(Debug, Default)]
struct SpentCodes {
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl SpentCodes {
    fn insert(&mut self, fingerprint: String) -> bool {
        if !self.seen.insert(fingerprint.clone()) {
            return false;
        }
        self.order.push_back(fingerprint);
        while self.order.len() > MAX_CONSUMED_CODES {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }
}

/// Authentication state of a session.
///
/// There is no externally visible intermediate state: a session is either signed out or
/// carries both a profile and credentials.
#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Authenticated {
        profile: UserProfile,
        credentials: CredentialBundle,
    },
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            SessionState::Authenticated { profile, .. } => Some(profile),
            SessionState::Unauthenticated => None,
        }
    }

    pub fn credentials(&self) -> Option<&CredentialBundle> {
        match self {
            SessionState::Authenticated { credentials, .. } => Some(credentials),
            SessionState::Unauthenticated => None,
        }
    }
}

/// Holds the state of one interactive session.
///
/// Besides the `SessionState` itself it tracks the CSRF states issued to this session and
/// the authorization codes this session has already spent, both bounded so a session cannot
/// grow without limit. Google codes expire within minutes, so forgetting the oldest spent
/// code leaves the provider to reject it. The exchange lock serializes the
/// exchange read-modify-write so concurrent callbacks for the same session cannot race.
#[derive(Debug)]
pub struct SessionStore {
    state: Mutex<SessionState>,
    pending_states: StateManager,
    consumed_codes: Mutex<SpentCodes>,
    exchange_lock: AsyncMutex<()>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_state_manager(StateManager::new())
    }

    /// Session whose issued CSRF states live for `ttl`.
    pub fn with_state_ttl(ttl: Duration) -> Self {
        Self::with_state_manager(StateManager::with_ttl(ttl))
    }

    fn with_state_manager(pending_states: StateManager) -> Self {
        Self {
            state: Mutex::new(SessionState::Unauthenticated),
            pending_states,
            consumed_codes: Mutex::new(SpentCodes::default()),
            exchange_lock: AsyncMutex::new(()),
        }
    }

    /// Snapshot of the current state.
    pub fn current(&self) -> SessionState {
        self.lock_state().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock_state().is_authenticated()
    }

    /// Move to `Authenticated`, replacing any prior state.
    ///
    /// Rejects a profile without an id or credentials without an access token, since the
    /// session would otherwise claim to be authenticated with nothing to show for it.
    pub fn complete_authentication(
        &self,
        profile: UserProfile,
        credentials: CredentialBundle,
    ) -> Result<(), Error> {
        if profile.id.is_empty() || credentials.access_token.expose_secret().is_empty() {
            return Err(oauth_error(
                ErrorKind::InvalidState,
                "refusing to authenticate a session without profile id and access token",
            ));
        }

        info!("Session authenticated for user {}", profile.id);
        *self.lock_state() = SessionState::Authenticated {
            profile,
            credentials,
        };
        Ok(())
    }

    /// Reset to `Unauthenticated`, discarding profile, credentials and pending CSRF states.
    ///
    /// Purely local, never fails. Spent codes stay recorded.
    pub fn sign_out(&self) {
        let mut state = self.lock_state();
        if state.is_authenticated() {
            debug!("Signing out session");
        }
        *state = SessionState::Unauthenticated;
        drop(state);
        self.pending_states.clear();
    }

    /// Record `code` as spent. Returns false if this session already spent it.
    ///
    /// Only the last `MAX_CONSUMED_CODES` codes are remembered.
    pub fn claim_code(&self, code: &str) -> bool {
        let fingerprint = hex::encode(Sha256::digest(code.as_bytes()));
        self.lock_codes().insert(fingerprint)
    }

    /// Remember a CSRF state issued in an authorization URL for this session.
    pub fn register_state(&self, state: String, pkce_verifier: Option<String>) {
        self.pending_states.cleanup_expired();
        self.pending_states.register(state, pkce_verifier);
    }

    /// Consume a CSRF state echoed on a callback.
    pub fn take_state(&self, state: &str) -> Option<StateData> {
        self.pending_states.validate(state)
    }

    /// Serialize the exchange step for this session.
    pub async fn lock_exchange(&self) -> AsyncMutexGuard<'_, ()> {
        self.exchange_lock.lock().await
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_codes(&self) -> MutexGuard<'_, SpentCodes> {
        self.consumed_codes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
