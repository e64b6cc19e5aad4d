//! Static description of the identity provider and this client's registration with it.

use secrecy::{ExposeSecret, SecretString};
use service::config::Config;
use url::Url;

use crate::error::{config_error, Error, ErrorKind};

/// Google's endpoints, shared with the command line defaults.
pub use service::config::{
    DEFAULT_GOOGLE_AUTH_URL as GOOGLE_AUTH_ENDPOINT,
    DEFAULT_GOOGLE_TOKEN_URL as GOOGLE_TOKEN_ENDPOINT,
    DEFAULT_GOOGLE_USERINFO_URL as GOOGLE_USERINFO_ENDPOINT,
};

/// Scopes for basic profile information.
pub const DEFAULT_SCOPES: [&str; 3] = [
    "openid",
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
];

/// Provider endpoints, client credentials, redirect target and requested scopes.
///
/// Immutable once handed to an `AuthController`. Construction never fails; `validate`
/// reports a malformed configuration so it can be surfaced before any flow starts.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    client_id: String,
    client_secret: SecretString,
    auth_endpoint: String,
    token_endpoint: String,
    userinfo_endpoint: String,
    redirect_uri: String,
    scopes: Vec<String>,
    use_pkce: bool,
}

impl ProviderConfig {
    /// Configuration against Google's endpoints with the default scopes.
    pub fn google(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret: SecretString::new(client_secret),
            auth_endpoint: GOOGLE_AUTH_ENDPOINT.to_string(),
            token_endpoint: GOOGLE_TOKEN_ENDPOINT.to_string(),
            userinfo_endpoint: GOOGLE_USERINFO_ENDPOINT.to_string(),
            redirect_uri,
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            use_pkce: true,
        }
    }

    /// Build from process configuration, failing with a configuration error when the
    /// client id or secret is absent or the result does not validate.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        if config.google_client_id().is_none() {
            return Err(config_error("GOOGLE_CLIENT_ID is not set"));
        }
        if config.google_client_secret().is_none() {
            return Err(config_error("GOOGLE_CLIENT_SECRET is not set"));
        }

        let provider_config = Self::load(config);
        provider_config.validate()?;
        Ok(provider_config)
    }

    /// Build from process configuration without validating.
    ///
    /// Absent credentials become empty strings, so a controller built from the result reports
    /// a configuration error on every request instead of starting a flow.
    pub fn load(config: &Config) -> Self {
        Self::google(
            config.google_client_id().unwrap_or_default(),
            config.google_client_secret().unwrap_or_default(),
            config.redirect_uri().to_string(),
        )
        .with_auth_endpoint(config.google_auth_url())
        .with_token_endpoint(config.google_token_url())
        .with_userinfo_endpoint(config.google_userinfo_url())
        .with_scopes(config.google_scopes())
        .with_pkce(config.oauth_use_pkce())
    }

    pub fn with_auth_endpoint(mut self, endpoint: &str) -> Self {
        self.auth_endpoint = endpoint.to_string();
        self
    }

    pub fn with_token_endpoint(mut self, endpoint: &str) -> Self {
        self.token_endpoint = endpoint.to_string();
        self
    }

    pub fn with_userinfo_endpoint(mut self, endpoint: &str) -> Self {
        self.userinfo_endpoint = endpoint.to_string();
        self
    }

    /// Replace the requested scopes. Duplicates are dropped, keeping the first occurrence.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ordered: Vec<String> = Vec::new();
        for scope in scopes {
            let scope = scope.as_ref().trim();
            if !scope.is_empty() && !ordered.iter().any(|s| s == scope) {
                ordered.push(scope.to_string());
            }
        }
        self.scopes = ordered;
        self
    }

    pub fn with_pkce(mut self, use_pkce: bool) -> Self {
        self.use_pkce = use_pkce;
        self
    }

    /// Check the configuration is usable for a flow.
    pub fn validate(&self) -> Result<(), Error> {
        if self.client_id.trim().is_empty() {
            return Err(config_error("client id is missing"));
        }
        if self.client_secret.expose_secret().trim().is_empty() {
            return Err(config_error("client secret is missing"));
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(config_error("redirect URI is missing"));
        }
        for (name, endpoint) in [
            ("authorization endpoint", &self.auth_endpoint),
            ("token endpoint", &self.token_endpoint),
            ("user-info endpoint", &self.userinfo_endpoint),
        ] {
            Url::parse(endpoint).map_err(|e| Error {
                source: Some(format!("{name} is not a valid URL: {e}").into()),
                error_kind: ErrorKind::Configuration,
            })?;
        }
        Ok(())
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &SecretString {
        &self.client_secret
    }

    pub fn auth_endpoint(&self) -> &str {
        &self.auth_endpoint
    }

    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    pub fn userinfo_endpoint(&self) -> &str {
        &self.userinfo_endpoint
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn use_pkce(&self) -> bool {
        self.use_pkce
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProviderConfig {
        ProviderConfig::google(
            "client-123".to_string(),
            "secret-456".to_string(),
            "http://localhost:4000/".to_string(),
        )
    }

    #[test]
    fn test_google_defaults() {
        let config = config();
        assert_eq!(config.auth_endpoint(), GOOGLE_AUTH_ENDPOINT);
        assert_eq!(config.token_endpoint(), GOOGLE_TOKEN_ENDPOINT);
        assert_eq!(config.userinfo_endpoint(), GOOGLE_USERINFO_ENDPOINT);
        assert_eq!(config.scopes().len(), 3);
        assert!(config.use_pkce());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scopes_keep_order_and_drop_duplicates() {
        let config = config().with_scopes(["email", "openid", "email", " ", "profile"]);
        assert_eq!(config.scopes(), ["email", "openid", "profile"]);
    }

    #[test]
    fn test_empty_client_id_is_configuration_error() {
        let config = ProviderConfig::google(
            String::new(),
            "secret".to_string(),
            "http://localhost:4000/".to_string(),
        );
        let err = config.validate().unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_empty_client_secret_is_configuration_error() {
        let config = ProviderConfig::google(
            "client".to_string(),
            String::new(),
            "http://localhost:4000/".to_string(),
        );
        let err = config.validate().unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_relative_endpoint_is_configuration_error() {
        let err = config()
            .with_token_endpoint("/token")
            .validate()
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("secret-456"));
    }

    fn service_config(args: &[&str]) -> Config {
        use clap::Parser;
        Config::parse_from(std::iter::once("google_signin_rs").chain(args.iter().copied()))
    }

    #[test]
    fn test_from_config_uses_process_settings() {
        let config = service_config(&[
            "--google-client-id",
            "client-123",
            "--google-client-secret",
            "secret-456",
            "--redirect-uri",
            "https://app.example.com/",
            "--google-token-url",
            "http://127.0.0.1:9999/token",
            "--oauth-use-pkce",
            "false",
        ]);

        let provider = ProviderConfig::from_config(&config).unwrap();

        assert_eq!(provider.client_id(), "client-123");
        assert_eq!(provider.client_secret().expose_secret(), "secret-456");
        assert_eq!(provider.redirect_uri(), "https://app.example.com/");
        assert_eq!(provider.token_endpoint(), "http://127.0.0.1:9999/token");
        assert_eq!(provider.auth_endpoint(), GOOGLE_AUTH_ENDPOINT);
        assert!(!provider.use_pkce());
    }

    #[test]
    fn test_from_config_without_secret_is_configuration_error() {
        let config = service_config(&["--google-client-id", "client-123"]);
        if config.google_client_secret().is_some() {
            // GOOGLE_CLIENT_SECRET is set in this environment
            return;
        }

        let err = ProviderConfig::from_config(&config).unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Configuration);

        let loaded = ProviderConfig::load(&config);
        assert_eq!(loaded.client_id(), "client-123");
        assert_eq!(
            loaded.validate().unwrap_err().error_kind,
            ErrorKind::Configuration
        );
    }

    #[test]
    fn test_command_line_defaults_are_google_endpoints() {
        let loaded = ProviderConfig::load(&service_config(&[]));
        let google = config();

        assert_eq!(loaded.auth_endpoint(), google.auth_endpoint());
        assert_eq!(loaded.token_endpoint(), google.token_endpoint());
        assert_eq!(loaded.userinfo_endpoint(), google.userinfo_endpoint());
        assert_eq!(GOOGLE_TOKEN_ENDPOINT, "https://oauth2.googleapis.com/token");
    }
}
