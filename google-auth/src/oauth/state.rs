//! CSRF state management for the authorization round trip.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// Default lifetime of an issued state token.
pub const DEFAULT_STATE_TTL_SECS: i64 = 600;

/// Most tokens a session keeps outstanding. Registering past it evicts the oldest.
pub const MAX_PENDING_STATES: usize = 16;

/// Data remembered for an issued state token.
#[derive(Debug, Clone)]
pub struct StateData {
    /// PKCE verifier issued alongside this state, if PKCE is in use.
    pub pkce_verifier: Option<String>,
    /// When this state expires.
    pub expires_at: DateTime<Utc>,
}

/// Issued-but-unused state tokens for one session.
///
/// Each token is single use: `validate` removes it whether or not it has expired.
#[derive(Debug)]
pub struct StateManager {
    states: Mutex<HashMap<String, StateData>>,
    ttl: Duration,
}

impl StateManager {
    /// Create a new state manager with the default TTL of 10 minutes.
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_STATE_TTL_SECS))
    }

    /// Create a new state manager with custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Generate a cryptographically random state token (64 hex characters).
    pub fn generate_token() -> String {
        let random_bytes: [u8; 32] = rand::thread_rng().gen();
        hex::encode(random_bytes)
    }

    /// Remember an issued state token together with its PKCE verifier.
    ///
    /// At most `MAX_PENDING_STATES` tokens are kept; the one closest to expiry makes room.
    pub fn register(&self, state: String, pkce_verifier: Option<String>) {
        let data = StateData {
            pkce_verifier,
            expires_at: Utc::now() + self.ttl,
        };
        let mut states = self.lock();
        while states.len() >= MAX_PENDING_STATES {
            let oldest = states
                .iter()
                .min_by_key(|(_, data)| data.expires_at)
                .map(|(token, _)| token.clone());
            match oldest {
                Some(token) => states.remove(&token),
                None => break,
            };
        }
        states.insert(state, data);
    }

    /// Validate and consume a state token.
    ///
    /// Returns `None` if the token was never issued, was already used, or has expired.
    pub fn validate(&self, state: &str) -> Option<StateData> {
        let data = self.lock().remove(state)?;
        if Utc::now() > data.expires_at {
            return None;
        }
        Some(data)
    }

    /// Drop expired tokens.
    pub fn cleanup_expired(&self) {
        let now = Utc::now();
        self.lock().retain(|_, data| data.expires_at > now);
    }

    /// Drop every pending token.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StateData>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token() {
        let state = StateManager::generate_token();
        assert_eq!(state.len(), 64);
        assert_ne!(state, StateManager::generate_token());
    }

    #[test]
    fn test_validate_registered_state() {
        let manager = StateManager::new();
        manager.register("abc".to_string(), Some("verifier".to_string()));

        let data = manager.validate("abc").expect("state should validate");
        assert_eq!(data.pkce_verifier.as_deref(), Some("verifier"));
    }

    #[test]
    fn test_validate_unknown_state() {
        let manager = StateManager::new();
        assert!(manager.validate("never-issued").is_none());
    }

    #[test]
    fn test_state_consumed_after_validation() {
        let manager = StateManager::new();
        manager.register("abc".to_string(), None);

        assert!(manager.validate("abc").is_some());
        assert!(manager.validate("abc").is_none());
    }

    #[test]
    fn test_expired_state() {
        let manager = StateManager::with_ttl(Duration::seconds(-1));
        manager.register("abc".to_string(), None);

        assert!(manager.validate("abc").is_none());
        assert_eq!(manager.pending(), 0);
    }

    #[test]
    fn test_cleanup_and_clear() {
        let expired = StateManager::with_ttl(Duration::seconds(-1));
        expired.register("old".to_string(), None);
        expired.cleanup_expired();
        assert_eq!(expired.pending(), 0);

        let manager = StateManager::new();
        manager.register("a".to_string(), None);
        manager.register("b".to_string(), None);
        manager.cleanup_expired();
        assert_eq!(manager.pending(), 2);
        manager.clear();
        assert_eq!(manager.pending(), 0);
    }

    #[test]
    fn test_pending_states_are_capped() {
        let manager = StateManager::new();
        for i in 0..MAX_PENDING_STATES * 4 {
            manager.register(format!("s{i}"), None);
        }

        assert_eq!(manager.pending(), MAX_PENDING_STATES);
        let newest = format!("s{}", MAX_PENDING_STATES * 4 - 1);
        assert!(manager.validate(&newest).is_some());
    }
}
