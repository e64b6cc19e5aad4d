//! # google-auth
//!
//! Sign-in with Google through the OAuth 2.0 authorization code grant:
//! - Provider configuration and authorization URL construction (CSRF state, PKCE)
//! - Authorization code exchange for credentials
//! - User profile retrieval
//! - Per-session authentication state and the controller that drives it
//!
//! ## Usage
//!
//! ```rust,ignore
//! use google_auth::{
//!     controller::{AuthController, RequestContext},
//!     oauth::ProviderConfig,
//!     session::SessionStore,
//! };
//!
//! let controller = AuthController::with_http_client(provider_config, http_client);
//! let outcome = controller.handle(&session, &RequestContext::new(code, state)).await;
//! ```

pub mod controller;
pub mod error;
pub mod http;
pub mod oauth;
pub mod session;

pub use error::{Error, ErrorKind};
