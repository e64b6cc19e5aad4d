//! OAuth 2.0 authorization code grant against an identity provider.

mod authorization;
pub mod config;
mod pkce;
mod profile;
mod state;

pub mod token;

pub use authorization::{build_authorization_url, AuthorizationRequest};
pub use config::ProviderConfig;
pub use pkce::{PkceChallenge, PkceVerifier};
pub use profile::{HttpProfileFetcher, ProfileFetcher, UserProfile};
pub use state::{StateData, StateManager, DEFAULT_STATE_TTL_SECS, MAX_PENDING_STATES};
