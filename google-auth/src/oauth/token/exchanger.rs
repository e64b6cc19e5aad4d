//! Authorization code exchange against the provider's token endpoint.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::CredentialBundle;
use crate::error::{oauth_error, Error, ErrorKind};
use crate::oauth::ProviderConfig;

/// Exchanges a one-time authorization code for a credential bundle.
///
/// Implementations make exactly one call per invocation and never retry.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(
        &self,
        config: &ProviderConfig,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<CredentialBundle, Error>;
}

/// Form body for `grant_type=authorization_code`.
#[derive(Debug, Serialize)]
struct TokenExchangeRequest<'a> {
    code: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    grant_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code_verifier: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    token_type: Option<String>,
    scope: Option<String>,
}

/// RFC 6749 §5.2 error body.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// `TokenExchanger` that POSTs to the configured token endpoint.
pub struct HttpTokenExchanger {
    http_client: reqwest::Client,
}

impl HttpTokenExchanger {
    /// The client should carry the outbound timeout, see `HttpClientBuilder`.
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl TokenExchanger for HttpTokenExchanger {
    async fn exchange(
        &self,
        config: &ProviderConfig,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<CredentialBundle, Error> {
        if code.is_empty() {
            return Err(oauth_error(
                ErrorKind::InvalidState,
                "token exchange attempted without an authorization code",
            ));
        }

        let request = TokenExchangeRequest {
            code,
            client_id: config.client_id(),
            client_secret: config.client_secret().expose_secret(),
            redirect_uri: config.redirect_uri(),
            grant_type: "authorization_code",
            code_verifier: pkce_verifier,
        };

        debug!("Exchanging authorization code at {}", config.token_endpoint());

        let response = self
            .http_client
            .post(config.token_endpoint())
            .form(&request)
            .send()
            .await
            .map_err(|e| {
                warn!("Token exchange request failed: {:?}", e);
                Error::from(e)
            })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let detail = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(TokenErrorResponse {
                    error,
                    error_description: Some(description),
                }) => format!("{error}: {description}"),
                Ok(TokenErrorResponse { error, .. }) => error,
                Err(_) => format!("HTTP {status}: {body}"),
            };
            warn!("Token endpoint rejected the exchange: {}", detail);
            return Err(oauth_error(ErrorKind::ExchangeFailed, &detail));
        }

        let tokens: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            warn!("Failed to parse token response: {:?}", e);
            Error {
                source: Some(format!("malformed token response: {e}").into()),
                error_kind: ErrorKind::ExchangeFailed,
            }
        })?;

        if tokens.access_token.is_empty() {
            return Err(oauth_error(
                ErrorKind::ExchangeFailed,
                "token response carried an empty access_token",
            ));
        }

        let scopes = match tokens.scope.as_deref().map(str::trim) {
            Some(granted) if !granted.is_empty() => {
                granted.split_whitespace().map(str::to_string).collect()
            }
            _ => config.scopes().to_vec(),
        };

        info!("Successfully exchanged authorization code for tokens");

        Ok(CredentialBundle {
            access_token: SecretString::new(tokens.access_token),
            refresh_token: tokens
                .refresh_token
                .filter(|token| !token.is_empty())
                .map(SecretString::new),
            token_type: tokens.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at: tokens
                .expires_in
                .and_then(Duration::try_seconds)
                .map(|lifetime| Utc::now() + lifetime),
            token_endpoint: config.token_endpoint().to_string(),
            client_id: config.client_id().to_string(),
            client_secret: config.client_secret().clone(),
            scopes,
        })
    }
}
