//! Error types for the `google-auth` crate.
//!
//! Follows a root `Error` struct holding an error kind plus an optional source for chaining.
//! The kinds are the ones the `AuthController` turns into `Error(kind)` views.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for google-auth crate.
/// Holds error kind and optional source for error chaining.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Categories of sign-in failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid static provider configuration. Fatal to starting any flow.
    Configuration,
    /// Transport failure or timeout talking to the provider. Never retried automatically.
    Network,
    /// The provider rejected the authorization code or returned an unusable token response.
    ExchangeFailed,
    /// The provider rejected the access token or returned an unusable user-info response.
    ProfileFetchFailed,
    /// Internal invariant violation, e.g. reaching the exchange step without a code.
    InvalidState,
    /// The `state` echoed on the callback was missing, unknown, or expired.
    StateMismatch,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration_error",
            ErrorKind::Network => "network_error",
            ErrorKind::ExchangeFailed => "exchange_failed",
            ErrorKind::ProfileFetchFailed => "profile_fetch_failed",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::StateMismatch => "state_mismatch",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Detail carried by the error, typically the provider's error text.
    pub fn detail(&self) -> Option<String> {
        self.source.as_ref().map(|source| source.to_string())
    }

    /// Human-readable message suitable for the `{errorMessage}` rendering.
    pub fn user_message(&self) -> String {
        match self.error_kind {
            ErrorKind::Configuration => "Google OAuth credentials are not set. Please set the \
                GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET environment variables."
                .to_string(),
            ErrorKind::Network => {
                "Could not reach the identity provider. Please sign in again.".to_string()
            }
            ErrorKind::ExchangeFailed => match self.detail() {
                Some(detail) => format!("Authentication error: {detail}"),
                None => "Authentication error.".to_string(),
            },
            ErrorKind::ProfileFetchFailed => "Failed to get user information.".to_string(),
            ErrorKind::InvalidState => "An internal error occurred. Please sign in again.".to_string(),
            ErrorKind::StateMismatch => {
                "The sign-in request could not be verified. Please sign in again.".to_string()
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "OAuth error ({}): {}", self.error_kind, detail),
            None => write!(f, "OAuth error ({})", self.error_kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// Transport level failures. Decoding failures are classified by the caller since they
// mean different things for the exchange and the profile fetch.
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let error_kind = if err.is_builder() {
            ErrorKind::Configuration
        } else {
            ErrorKind::Network
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Configuration,
        }
    }
}

/// Helper function to create errors carrying a message.
pub fn oauth_error(kind: ErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: kind,
    }
}

/// Helper function to create configuration errors.
pub fn config_error(message: &str) -> Error {
    oauth_error(ErrorKind::Configuration, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_failed_message_carries_provider_detail() {
        let err = oauth_error(ErrorKind::ExchangeFailed, "invalid_grant: Bad Request");
        assert_eq!(
            err.user_message(),
            "Authentication error: invalid_grant: Bad Request"
        );
    }

    #[test]
    fn test_display_includes_kind() {
        let err = config_error("client id is missing");
        assert_eq!(
            err.to_string(),
            "OAuth error (configuration_error): client id is missing"
        );
    }

    #[test]
    fn test_error_without_source() {
        let err = Error {
            source: None,
            error_kind: ErrorKind::InvalidState,
        };
        assert!(err.detail().is_none());
        assert!(StdError::source(&err).is_none());
    }
}
