//! Credential bundle produced by a successful code exchange.

use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;

/// Access/refresh credentials plus what a later refresh would need.
///
/// Created once per successful exchange and owned by the `SessionStore` for the lifetime
/// of the session. Nothing here is persisted.
#[derive(Debug, Clone)]
pub struct CredentialBundle {
    /// Short-lived bearer token.
    pub access_token: SecretString,
    /// Absent when the provider did not grant offline access.
    pub refresh_token: Option<SecretString>,
    /// Token type reported by the provider (usually "Bearer").
    pub token_type: String,
    /// When the access token expires, if the provider said.
    pub expires_at: Option<DateTime<Utc>>,
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Granted scopes.
    pub scopes: Vec<String>,
}

impl CredentialBundle {
    /// True if the access token is expired or will expire within 5 minutes.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires| expires <= Utc::now() + Duration::minutes(5))
            .unwrap_or(false)
    }

    /// Remaining lifetime of the access token.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expires_at.map(|expires| expires - Utc::now())
    }
}
