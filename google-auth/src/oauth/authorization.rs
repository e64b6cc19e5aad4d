//! Authorization URL construction.

use url::Url;

use super::pkce::{PkceVerifier, CHALLENGE_METHOD};
use super::state::StateManager;
use super::ProviderConfig;
use crate::error::{config_error, Error};

/// Authorization request with URL and the data that must be remembered for the callback.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Authorization URL to send the user to.
    pub url: Url,
    /// CSRF state parameter embedded in the URL.
    pub state: String,
    /// PKCE verifier to present at code exchange, when PKCE is enabled.
    pub pkce_verifier: Option<String>,
}

/// Build the URL the user is redirected to for consent.
///
/// Pure apart from the fresh `state` token (and PKCE verifier) it generates. Fails only when
/// the configuration lacks a client id or redirect URI or has an unparsable endpoint.
pub fn build_authorization_url(config: &ProviderConfig) -> Result<AuthorizationRequest, Error> {
    if config.client_id().trim().is_empty() {
        return Err(config_error("client id is missing"));
    }
    if config.redirect_uri().trim().is_empty() {
        return Err(config_error("redirect URI is missing"));
    }

    let state = StateManager::generate_token();
    let pkce_verifier = config.use_pkce().then(PkceVerifier::generate);

    let mut url = Url::parse(config.auth_endpoint())?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("response_type", "code")
            .append_pair("client_id", config.client_id())
            .append_pair("redirect_uri", config.redirect_uri())
            .append_pair("scope", &config.scopes().join(" "))
            .append_pair("state", &state)
            .append_pair("access_type", "offline")
            .append_pair("include_granted_scopes", "true")
            .append_pair("prompt", "consent");
        if let Some(verifier) = &pkce_verifier {
            query
                .append_pair("code_challenge", verifier.challenge().as_str())
                .append_pair("code_challenge_method", CHALLENGE_METHOD);
        }
    }

    Ok(AuthorizationRequest {
        url,
        state,
        pkce_verifier: pkce_verifier.map(PkceVerifier::into_string),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::oauth::pkce::PkceChallenge;
    use crate::ErrorKind;

    fn config() -> ProviderConfig {
        ProviderConfig::google(
            "client-123.apps.googleusercontent.com".to_string(),
            "secret".to_string(),
            "https://app.example.com/oauth/callback?from=google".to_string(),
        )
    }

    fn query(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn test_url_carries_fixed_flow_parameters() {
        let request = build_authorization_url(&config()).unwrap();
        let params = query(&request.url);

        assert_eq!(params["response_type"], "code");
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["include_granted_scopes"], "true");
        assert_eq!(params["prompt"], "consent");
        assert_eq!(params["client_id"], "client-123.apps.googleusercontent.com");
        assert_eq!(params["state"], request.state);
        assert!(request.url.as_str().starts_with(crate::oauth::config::GOOGLE_AUTH_ENDPOINT));
    }

    #[test]
    fn test_redirect_uri_is_escaped() {
        let request = build_authorization_url(&config()).unwrap();
        let raw = request.url.as_str();

        assert!(raw.contains(
            "redirect_uri=https%3A%2F%2Fapp.example.com%2Foauth%2Fcallback%3Ffrom%3Dgoogle"
        ));
        assert_eq!(
            query(&request.url)["redirect_uri"],
            "https://app.example.com/oauth/callback?from=google"
        );
    }

    #[test]
    fn test_all_scopes_space_joined_in_order() {
        let config = config().with_scopes(["openid", "email", "profile"]);
        let request = build_authorization_url(&config).unwrap();

        assert_eq!(query(&request.url)["scope"], "openid email profile");
    }

    #[test]
    fn test_state_is_fresh_per_request() {
        let first = build_authorization_url(&config()).unwrap();
        let second = build_authorization_url(&config()).unwrap();
        assert_ne!(first.state, second.state);
    }

    #[test]
    fn test_pkce_challenge_matches_returned_verifier() {
        let request = build_authorization_url(&config()).unwrap();
        let params = query(&request.url);
        let verifier = PkceVerifier::from_string(request.pkce_verifier.unwrap());

        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(
            params["code_challenge"],
            PkceChallenge::from_verifier(&verifier).as_str()
        );
    }

    #[test]
    fn test_pkce_disabled() {
        let request = build_authorization_url(&config().with_pkce(false)).unwrap();
        assert!(request.pkce_verifier.is_none());
        assert!(!query(&request.url).contains_key("code_challenge"));
    }

    #[test]
    fn test_missing_client_id_is_configuration_error() {
        let config = ProviderConfig::google(
            " ".to_string(),
            "secret".to_string(),
            "http://localhost:4000/".to_string(),
        );
        let err = build_authorization_url(&config).unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Configuration);
    }
}
