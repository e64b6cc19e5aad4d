//! Sign-in orchestration: decides per request whether to offer a login URL, complete a
//! code exchange, or show the authenticated profile, and owns the session transition.

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{oauth_error, Error, ErrorKind};
use crate::oauth::token::{HttpTokenExchanger, TokenExchanger};
use crate::oauth::{
    build_authorization_url, HttpProfileFetcher, ProfileFetcher, ProviderConfig, UserProfile,
};
use crate::session::{SessionState, SessionStore};

/// Inbound request as far as sign-in is concerned. Empty parameters count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    code: Option<String>,
    state: Option<String>,
    provider_error: Option<String>,
}

impl RequestContext {
    pub fn new(code: Option<String>, state: Option<String>) -> Self {
        Self {
            code: code.filter(|c| !c.is_empty()),
            state: state.filter(|s| !s.is_empty()),
            provider_error: None,
        }
    }

    /// The `error` Google sends back instead of a code, e.g. `access_denied`.
    pub fn with_provider_error(mut self, provider_error: Option<String>) -> Self {
        self.provider_error = provider_error.filter(|e| !e.is_empty());
        self
    }

    /// Pick `code`, `state` and `error` out of query-style pairs. The first occurrence wins.
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut code = None;
        let mut state = None;
        let mut provider_error = None;
        for (key, value) in pairs {
            match key.as_ref() {
                "code" if code.is_none() => code = Some(value.into()),
                "state" if state.is_none() => state = Some(value.into()),
                "error" if provider_error.is_none() => provider_error = Some(value.into()),
                _ => {}
            }
        }
        Self::new(code, state).with_provider_error(provider_error)
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    pub fn provider_error(&self) -> Option<&str> {
        self.provider_error.as_deref()
    }

    /// Whether the request is a return from the provider, successful or not.
    pub fn is_callback(&self) -> bool {
        self.code.is_some() || self.provider_error.is_some()
    }
}

/// States of the sign-in state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    ShowLogin,
    Exchanging,
    ShowProfile,
    /// Terminal for the current request; the next request starts over.
    Error(ErrorKind),
}

impl ControllerState {
    /// Initial state for a request. A provider `error` ends the flow before any exchange.
    pub fn determine(session: &SessionState, request: &RequestContext) -> Self {
        if session.is_authenticated() {
            ControllerState::ShowProfile
        } else if request.provider_error().is_some() {
            ControllerState::Error(ErrorKind::ExchangeFailed)
        } else if request.code().is_some() {
            ControllerState::Exchanging
        } else {
            ControllerState::ShowLogin
        }
    }
}

/// What the presentation layer should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthView {
    ShowLogin { login_url: String },
    ShowProfile { profile: UserProfile },
    Error { kind: ErrorKind, message: String },
}

impl AuthView {
    fn from_error(err: &Error) -> Self {
        AuthView::Error {
            kind: err.error_kind,
            message: err.user_message(),
        }
    }

    pub fn state(&self) -> ControllerState {
        match self {
            AuthView::ShowLogin { .. } => ControllerState::ShowLogin,
            AuthView::ShowProfile { .. } => ControllerState::ShowProfile,
            AuthView::Error { kind, .. } => ControllerState::Error(*kind),
        }
    }

    /// Output contract consumed by the presentation layer.
    pub fn rendered(&self) -> RenderedOutput {
        match self {
            AuthView::ShowLogin { login_url } => RenderedOutput::Login {
                login_url: login_url.clone(),
            },
            AuthView::ShowProfile { profile } => RenderedOutput::Profile {
                profile: profile.clone(),
            },
            AuthView::Error { message, .. } => RenderedOutput::Error {
                error_message: message.clone(),
            },
        }
    }
}

/// `{loginUrl}`, `{profile}` or `{errorMessage}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RenderedOutput {
    Login {
        #[serde(rename = "loginUrl")]
        login_url: String,
    },
    Profile {
        profile: UserProfile,
    },
    Error {
        #[serde(rename = "errorMessage")]
        error_message: String,
    },
}

/// Result of handling one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub view: AuthView,
    /// The caller must drop `code` (and `state`) from the request it re-renders, so a
    /// reload never resubmits a spent code.
    pub clear_code_parameter: bool,
}

/// Drives the authorization code grant for one provider configuration.
///
/// Holds no per-user data; every call receives the `SessionStore` of the session it acts on.
pub struct AuthController {
    config: ProviderConfig,
    exchanger: Arc<dyn TokenExchanger>,
    fetcher: Arc<dyn ProfileFetcher>,
}

impl AuthController {
    pub fn new(
        config: ProviderConfig,
        exchanger: Arc<dyn TokenExchanger>,
        fetcher: Arc<dyn ProfileFetcher>,
    ) -> Self {
        Self {
            config,
            exchanger,
            fetcher,
        }
    }

    /// Controller talking to the configured endpoints over `http_client`.
    pub fn with_http_client(config: ProviderConfig, http_client: reqwest::Client) -> Self {
        let fetcher = HttpProfileFetcher::new(http_client.clone(), config.userinfo_endpoint());
        let exchanger = HttpTokenExchanger::new(http_client);
        Self::new(config, Arc::new(exchanger), Arc::new(fetcher))
    }

    /// Handle one inbound request against `session`.
    pub async fn handle(&self, session: &SessionStore, request: &RequestContext) -> Outcome {
        if let Err(err) = self.config.validate() {
            warn!("Sign-in unavailable: {}", err);
            return Outcome {
                view: AuthView::from_error(&err),
                clear_code_parameter: false,
            };
        }

        let clear_code_parameter = request.is_callback();
        let snapshot = session.current();

        let view = match ControllerState::determine(&snapshot, request) {
            ControllerState::ShowProfile => match snapshot.profile() {
                Some(profile) => AuthView::ShowProfile {
                    profile: profile.clone(),
                },
                None => AuthView::from_error(&oauth_error(
                    ErrorKind::InvalidState,
                    "authenticated session without a profile",
                )),
            },
            ControllerState::Exchanging => match self.complete_exchange(session, request).await {
                Ok(profile) => AuthView::ShowProfile { profile },
                Err(err) => {
                    warn!("Sign-in failed: {}", err);
                    AuthView::from_error(&err)
                }
            },
            ControllerState::ShowLogin => self.login(session),
            ControllerState::Error(kind) => {
                let reason = request.provider_error().unwrap_or("access_denied");
                warn!("Authorization was not granted: {}", reason);
                // The state is spent either way
                if let Some(state) = request.state() {
                    session.take_state(state);
                }
                AuthView::from_error(&oauth_error(kind, reason))
            }
        };

        Outcome {
            view,
            clear_code_parameter,
        }
    }

    /// Produce a login URL and remember its `state` in the session.
    pub fn login(&self, session: &SessionStore) -> AuthView {
        match build_authorization_url(&self.config) {
            Ok(request) => {
                session.register_state(request.state, request.pkce_verifier);
                AuthView::ShowLogin {
                    login_url: request.url.to_string(),
                }
            }
            Err(err) => {
                warn!("Could not build authorization URL: {}", err);
                AuthView::from_error(&err)
            }
        }
    }

    /// Sign the session out and offer a fresh login.
    pub fn sign_out(&self, session: &SessionStore) -> Outcome {
        session.sign_out();
        info!("Session signed out");
        Outcome {
            view: self.login(session),
            clear_code_parameter: false,
        }
    }

    /// Exchange the inbound code and fetch the profile, then authenticate the session.
    ///
    /// The session is only mutated after both calls succeed. The code counts as spent as
    /// soon as this starts, whatever the outcome.
    async fn complete_exchange(
        &self,
        session: &SessionStore,
        request: &RequestContext,
    ) -> Result<UserProfile, Error> {
        let code = request
            .code()
            .filter(|code| !code.is_empty())
            .ok_or_else(|| {
                oauth_error(
                    ErrorKind::InvalidState,
                    "exchange step reached without an authorization code",
                )
            })?;

        let _guard = session.lock_exchange().await;

        if let Some(profile) = session.current().profile() {
            debug!("Session was authenticated by a concurrent request, ignoring callback code");
            return Ok(profile.clone());
        }

        if !session.claim_code(code) {
            return Err(oauth_error(
                ErrorKind::ExchangeFailed,
                "authorization code has already been used",
            ));
        }

        let state_data = request
            .state()
            .and_then(|state| session.take_state(state))
            .ok_or_else(|| {
                oauth_error(
                    ErrorKind::StateMismatch,
                    "state parameter is missing, unknown or expired",
                )
            })?;

        let credentials = self
            .exchanger
            .exchange(&self.config, code, state_data.pkce_verifier.as_deref())
            .await?;

        let profile = self
            .fetcher
            .fetch_profile(credentials.access_token.expose_secret())
            .await?;

        session.complete_authentication(profile.clone(), credentials)?;
        Ok(profile)
    }
}
