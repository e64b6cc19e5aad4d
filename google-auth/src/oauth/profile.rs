//! Authenticated user's profile from the provider's user-info endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{oauth_error, Error, ErrorKind};

/// Normalized profile of the signed-in user. Replaced wholesale on re-authentication.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Provider's unique user identifier. Never empty.
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub picture_url: Option<String>,
    pub verified_email: Option<bool>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub locale: Option<String>,
}

impl UserProfile {
    /// Name to greet the user with.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("User")
    }
}

/// User-info response as Google's v2 endpoint shapes it.
#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    id: Option<String>,
    name: Option<String>,
    email: Option<String>,
    picture: Option<String>,
    verified_email: Option<bool>,
    given_name: Option<String>,
    family_name: Option<String>,
    locale: Option<String>,
}

impl UserInfoResponse {
    fn into_profile(self) -> Result<UserProfile, Error> {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| oauth_error(ErrorKind::ProfileFetchFailed, "user info lacks an id"))?;

        Ok(UserProfile {
            id,
            name: self.name,
            email: self.email,
            picture_url: self.picture,
            verified_email: self.verified_email,
            given_name: self.given_name,
            family_name: self.family_name,
            locale: self.locale,
        })
    }
}

/// Fetches the profile belonging to a bearer token.
#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    async fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, Error>;
}

/// `ProfileFetcher` that GETs the configured user-info endpoint.
pub struct HttpProfileFetcher {
    http_client: reqwest::Client,
    userinfo_endpoint: String,
}

impl HttpProfileFetcher {
    pub fn new(http_client: reqwest::Client, userinfo_endpoint: &str) -> Self {
        Self {
            http_client,
            userinfo_endpoint: userinfo_endpoint.to_string(),
        }
    }
}

#[async_trait]
impl ProfileFetcher for HttpProfileFetcher {
    async fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, Error> {
        if access_token.is_empty() {
            return Err(oauth_error(
                ErrorKind::InvalidState,
                "profile fetch attempted without an access token",
            ));
        }

        debug!("Fetching user info from {}", self.userinfo_endpoint);

        let response = self
            .http_client
            .get(&self.userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                warn!("User info request failed: {:?}", e);
                Error::from(e)
            })?;

        let status = response.status();
        let body = response.text().await?;

        if status != reqwest::StatusCode::OK {
            warn!("User info endpoint returned {}", status);
            return Err(oauth_error(
                ErrorKind::ProfileFetchFailed,
                &format!("HTTP {status}: {body}"),
            ));
        }

        let user_info: UserInfoResponse = serde_json::from_str(&body).map_err(|e| {
            warn!("Failed to parse user info: {:?}", e);
            Error {
                source: Some(format!("malformed user info response: {e}").into()),
                error_kind: ErrorKind::ProfileFetchFailed,
            }
        })?;

        user_info.into_profile()
    }
}
