//! GitHub OAuth 2.0 provider.
//!
//! - `redirect_to_provider`: stores a CSRF token in the `state` cookie and
//!   sends the browser to GitHub's authorization page
//! - `verify`: checks the token, exchanges the code, then reads `/user` and
//!   `/user/emails` to build the profile

use async_trait::async_trait;
use axum::response::Redirect;
use gatehouse_core::Profile;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, RedirectUrl, Scope, TokenResponse, TokenUrl, basic::BasicClient,
};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::instrument;

use super::{AuthProvider, OAuthProvider, csrf};
use crate::error::{AuthError, ConfigError};
use crate::event::AuthEvent;

/// Registry name of the provider.
pub const GITHUB: &str = "github";

/// Cookie holding the CSRF token between redirect and callback.
const STATE_COOKIE: &str = "state";

const SCOPES: &[&str] = &["read:user", "user:email"];

/// GitHub rejects API requests without a User-Agent.
const USER_AGENT: &str = concat!("gatehouse/", env!("CARGO_PKG_VERSION"));

type GithubClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Credentials of a GitHub OAuth app.
#[derive(Clone, Deserialize)]
pub struct GithubConfig {
    client_id: String,
    client_secret: String,
    /// Mark the CSRF cookie `Secure`. Default: true
    #[serde(default = "default_secure_cookies")]
    secure_cookies: bool,
}

fn default_secure_cookies() -> bool {
    true
}

impl GithubConfig {
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            secure_cookies: default_secure_cookies(),
        }
    }

    #[must_use]
    pub fn secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl std::fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("secure_cookies", &self.secure_cookies)
            .finish()
    }
}

/// Endpoint URLs, overridable to point at a GitHub Enterprise host or a test server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubEndpoints {
    pub authorize: String,
    pub token: String,
    pub user: String,
    pub emails: String,
}

impl Default for GithubEndpoints {
    fn default() -> Self {
        Self {
            authorize: "https://github.com/login/oauth/authorize".to_string(),
            token: "https://github.com/login/oauth/access_token".to_string(),
            user: "https://api.github.com/user".to_string(),
            emails: "https://api.github.com/user/emails".to_string(),
        }
    }
}

impl GithubEndpoints {
    /// Endpoints rooted at `base`, laid out like github.com.
    #[must_use]
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            authorize: format!("{base}/login/oauth/authorize"),
            token: format!("{base}/login/oauth/access_token"),
            user: format!("{base}/user"),
            emails: format!("{base}/user/emails"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    id: u64,
    login: String,
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubEmail {
    email: String,
    #[serde(default)]
    primary: bool,
}

/// Sign-in with GitHub.
#[derive(Debug)]
pub struct GithubProvider {
    config: GithubConfig,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    endpoints: GithubEndpoints,
    http: reqwest::Client,
}

impl GithubProvider {
    /// Creates a provider talking to github.com.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: GithubConfig) -> Result<Self, ConfigError> {
        Self::with_endpoints(config, GithubEndpoints::default())
    }

    /// Creates a provider talking to custom endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if an endpoint is not a valid URL or the HTTP client
    /// cannot be built.
    pub fn with_endpoints(
        config: GithubConfig,
        endpoints: GithubEndpoints,
    ) -> Result<Self, ConfigError> {
        let auth_url =
            AuthUrl::new(endpoints.authorize.clone()).map_err(|e| ConfigError::InvalidUrl {
                field: "github authorize endpoint",
                reason: e.to_string(),
            })?;
        let token_url =
            TokenUrl::new(endpoints.token.clone()).map_err(|e| ConfigError::InvalidUrl {
                field: "github token endpoint",
                reason: e.to_string(),
            })?;

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ConfigError::HttpClient {
                reason: e.to_string(),
            })?;

        Ok(Self {
            config,
            auth_url,
            token_url,
            endpoints,
            http,
        })
    }

    fn client(&self, callback_uri: &str) -> Result<GithubClient, AuthError> {
        let redirect_url =
            RedirectUrl::new(callback_uri.to_string()).map_err(|_| AuthError::InvalidCallbackUri {
                uri: callback_uri.to_string(),
            })?;

        Ok(BasicClient::new(ClientId::new(self.config.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.config.client_secret.clone()))
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(redirect_url)
            .set_auth_type(AuthType::RequestBody))
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &str, access_token: &str) -> Result<T, AuthError> {
        let profile_error = |e: reqwest::Error| AuthError::ProfileFetch {
            provider: GITHUB.to_string(),
            reason: e.to_string(),
        };

        self.http
            .get(url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(profile_error)?
            .json::<T>()
            .await
            .map_err(profile_error)
    }
}

/// Picks the primary address, else the first listed, else the public profile email.
fn select_email(emails: &[GithubEmail], public_email: Option<String>) -> Option<String> {
    emails
        .iter()
        .find(|e| e.primary)
        .or_else(|| emails.first())
        .map(|e| e.email.clone())
        .or(public_email)
        .filter(|email| !email.is_empty())
}

#[async_trait]
impl AuthProvider for GithubProvider {
    fn name(&self) -> &str {
        GITHUB
    }

    #[instrument(skip_all, fields(provider = GITHUB))]
    async fn verify(
        &self,
        event: &mut AuthEvent,
        callback_uri: &str,
    ) -> Result<Profile, AuthError> {
        let expected = csrf::take_token(event, STATE_COOKIE);
        let code = csrf::authorization_code(event, expected.as_deref(), GITHUB)?;

        let token = self
            .client(callback_uri)?
            .exchange_code(AuthorizationCode::new(code))
            .request_async(&self.http)
            .await
            .map_err(|e| AuthError::TokenExchange {
                provider: GITHUB.to_string(),
                reason: e.to_string(),
            })?;
        let access_token = token.access_token().secret();

        let user: GithubUser = self.fetch(&self.endpoints.user, access_token).await?;
        let emails: Vec<GithubEmail> = self.fetch(&self.endpoints.emails, access_token).await?;

        let email = select_email(&emails, user.email).ok_or_else(|| AuthError::MissingEmail {
            provider: GITHUB.to_string(),
        })?;

        tracing::debug!(user_id = user.id, login = %user.login, "github user verified");

        Ok(Profile::new(GITHUB, user.id.to_string(), email)
            .with_username(Some(user.login))
            .with_name(user.name))
    }

    fn oauth(&self) -> Option<&dyn OAuthProvider> {
        Some(self)
    }
}

#[async_trait]
impl OAuthProvider for GithubProvider {
    #[instrument(skip_all, fields(provider = GITHUB))]
    async fn redirect_to_provider(
        &self,
        event: &mut AuthEvent,
        callback_uri: &str,
    ) -> Result<Redirect, AuthError> {
        let (url, state) = self
            .client(callback_uri)?
            .authorize_url(CsrfToken::new_random)
            .add_scopes(SCOPES.iter().map(|s| Scope::new((*s).to_string())))
            .url();

        csrf::store_token(
            event,
            STATE_COOKIE,
            state.secret(),
            self.config.secure_cookies,
        );

        Ok(Redirect::temporary(url.as_str()))
    }
}
