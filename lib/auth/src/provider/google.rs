//! Google sign-in over OpenID Connect.
//!
//! Provider metadata, including the ID-token signing keys, is discovered on
//! first use and re-discovered once it is older than `metadata_ttl_seconds`,
//! so rotated keys are picked up without a restart. One random token serves
//! as both the OAuth `state` and the ID-token `nonce`; it travels in the
//! `nonce` cookie.

use async_trait::async_trait;
use axum::response::Redirect;
use gatehouse_core::Profile;
use openidconnect::core::{CoreAuthenticationFlow, CoreClient, CoreProviderMetadata};
use openidconnect::{
    AuthorizationCode, ClientId, ClientSecret, CsrfToken, IssuerUrl, Nonce, RedirectUrl, Scope,
    TokenResponse,
};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::instrument;

use super::{AuthProvider, OAuthProvider, csrf};
use crate::error::{AuthError, ConfigError};
use crate::event::AuthEvent;

/// Registry name of the provider.
pub const GOOGLE: &str = "google";

/// Cookie holding the state/nonce token between redirect and callback.
const NONCE_COOKIE: &str = "nonce";

/// Requested on top of `openid`, which the client always adds.
const SCOPES: &[&str] = &["email", "profile"];

/// Credentials of a Google OAuth client.
#[derive(Clone, Deserialize)]
pub struct GoogleConfig {
    client_id: String,
    client_secret: String,
    /// Default: "https://accounts.google.com"
    #[serde(default = "default_issuer_url")]
    issuer_url: String,
    /// Mark the nonce cookie `Secure`. Default: true
    #[serde(default = "default_secure_cookies")]
    secure_cookies: bool,
    /// How long discovered metadata and signing keys are reused. Default: 3600
    #[serde(default = "default_metadata_ttl_seconds")]
    metadata_ttl_seconds: u64,
}

fn default_issuer_url() -> String {
    "https://accounts.google.com".to_string()
}

fn default_metadata_ttl_seconds() -> u64 {
    60 * 60
}

fn default_secure_cookies() -> bool {
    true
}

impl GoogleConfig {
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            issuer_url: default_issuer_url(),
            secure_cookies: default_secure_cookies(),
            metadata_ttl_seconds: default_metadata_ttl_seconds(),
        }
    }

    #[must_use]
    pub fn issuer_url(mut self, issuer_url: impl Into<String>) -> Self {
        self.issuer_url = issuer_url.into();
        self
    }

    #[must_use]
    pub fn secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn metadata_ttl_seconds(mut self, seconds: u64) -> Self {
        self.metadata_ttl_seconds = seconds;
        self
    }
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("issuer_url", &self.issuer_url)
            .field("secure_cookies", &self.secure_cookies)
            .field("metadata_ttl_seconds", &self.metadata_ttl_seconds)
            .finish()
    }
}

#[derive(Debug)]
struct CachedMetadata {
    metadata: CoreProviderMetadata,
    fetched_at: Instant,
}

/// Sign-in with Google.
#[derive(Debug)]
pub struct GoogleProvider {
    config: GoogleConfig,
    issuer: IssuerUrl,
    metadata_ttl: Duration,
    metadata: RwLock<Option<CachedMetadata>>,
    http: reqwest::Client,
}

impl GoogleProvider {
    /// Creates a provider that discovers its metadata on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the issuer URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: GoogleConfig) -> Result<Self, ConfigError> {
        Self::build(config, None)
    }

    /// Creates a provider with already-known metadata, skipping discovery
    /// until the metadata expires.
    ///
    /// # Errors
    ///
    /// Returns an error if the issuer URL is invalid or the HTTP client
    /// cannot be built.
    pub fn with_metadata(
        config: GoogleConfig,
        metadata: CoreProviderMetadata,
    ) -> Result<Self, ConfigError> {
        Self::build(
            config,
            Some(CachedMetadata {
                metadata,
                fetched_at: Instant::now(),
            }),
        )
    }

    fn build(
        config: GoogleConfig,
        metadata: Option<CachedMetadata>,
    ) -> Result<Self, ConfigError> {
        let issuer =
            IssuerUrl::new(config.issuer_url.clone()).map_err(|e| ConfigError::InvalidUrl {
                field: "google issuer_url",
                reason: e.to_string(),
            })?;

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ConfigError::HttpClient {
                reason: e.to_string(),
            })?;

        Ok(Self {
            metadata_ttl: Duration::from_secs(config.metadata_ttl_seconds),
            config,
            issuer,
            metadata: RwLock::new(metadata),
            http,
        })
    }

    fn fresh(&self, cached: Option<&CachedMetadata>) -> Option<CoreProviderMetadata> {
        cached
            .filter(|cached| cached.fetched_at.elapsed() < self.metadata_ttl)
            .map(|cached| cached.metadata.clone())
    }

    async fn metadata(&self) -> Result<CoreProviderMetadata, AuthError> {
        let current = self.fresh(self.metadata.read().await.as_ref());
        if let Some(metadata) = current {
            return Ok(metadata);
        }

        let mut cached = self.metadata.write().await;
        // Another request may have refreshed it while this one waited.
        if let Some(metadata) = self.fresh(cached.as_ref()) {
            return Ok(metadata);
        }

        tracing::debug!(issuer = %self.issuer.as_str(), "discovering provider metadata");
        let metadata = CoreProviderMetadata::discover_async(self.issuer.clone(), &self.http)
            .await
            .map_err(|e| AuthError::Discovery {
                provider: GOOGLE.to_string(),
                reason: e.to_string(),
            })?;
        *cached = Some(CachedMetadata {
            metadata: metadata.clone(),
            fetched_at: Instant::now(),
        });
        Ok(metadata)
    }

    fn redirect_url(callback_uri: &str) -> Result<RedirectUrl, AuthError> {
        RedirectUrl::new(callback_uri.to_string()).map_err(|_| AuthError::InvalidCallbackUri {
            uri: callback_uri.to_string(),
        })
    }
}

#[async_trait]
impl AuthProvider for GoogleProvider {
    fn name(&self) -> &str {
        GOOGLE
    }

    #[instrument(skip_all, fields(provider = GOOGLE))]
    async fn verify(
        &self,
        event: &mut AuthEvent,
        callback_uri: &str,
    ) -> Result<Profile, AuthError> {
        let expected = csrf::take_token(event, NONCE_COOKIE);
        let code = csrf::authorization_code(event, expected.as_deref(), GOOGLE)?;
        // authorization_code only succeeds when the cookie was present.
        let nonce = Nonce::new(expected.unwrap_or_default());

        let client = CoreClient::from_provider_metadata(
            self.metadata().await?,
            ClientId::new(self.config.client_id.clone()),
            Some(ClientSecret::new(self.config.client_secret.clone())),
        )
        .set_redirect_uri(Self::redirect_url(callback_uri)?);

        let token_error = |reason: String| AuthError::TokenExchange {
            provider: GOOGLE.to_string(),
            reason,
        };

        let token_response = client
            .exchange_code(AuthorizationCode::new(code))
            .map_err(|e| token_error(e.to_string()))?
            .request_async(&self.http)
            .await
            .map_err(|e| token_error(e.to_string()))?;

        let id_token = token_response
            .id_token()
            .ok_or_else(|| token_error("no ID token in response".to_string()))?;
        let claims = id_token
            .claims(&client.id_token_verifier(), &nonce)
            .map_err(|e| AuthError::ProfileFetch {
                provider: GOOGLE.to_string(),
                reason: format!("ID token validation failed: {e}"),
            })?;

        let email = claims
            .email()
            .map(|e| e.as_str().to_string())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AuthError::MissingEmail {
                provider: GOOGLE.to_string(),
            })?;
        let name = claims
            .name()
            .and_then(|n| n.get(None))
            .map(|n| n.as_str().to_string());

        Ok(
            Profile::new(GOOGLE, claims.subject().as_str(), email.clone())
                .with_username(Some(email))
                .with_name(name),
        )
    }

    fn oauth(&self) -> Option<&dyn OAuthProvider> {
        Some(self)
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    #[instrument(skip_all, fields(provider = GOOGLE))]
    async fn redirect_to_provider(
        &self,
        event: &mut AuthEvent,
        callback_uri: &str,
    ) -> Result<Redirect, AuthError> {
        let client = CoreClient::from_provider_metadata(
            self.metadata().await?,
            ClientId::new(self.config.client_id.clone()),
            Some(ClientSecret::new(self.config.client_secret.clone())),
        )
        .set_redirect_uri(Self::redirect_url(callback_uri)?);

        let token = CsrfToken::new_random();
        let nonce = Nonce::new(token.secret().clone());
        csrf::store_token(
            event,
            NONCE_COOKIE,
            token.secret(),
            self.config.secure_cookies,
        );

        let mut request = client.authorize_url(
            CoreAuthenticationFlow::AuthorizationCode,
            move || token,
            move || nonce,
        );
        for scope in SCOPES {
            request = request.add_scope(Scope::new((*scope).to_string()));
        }
        let (url, _, _) = request.url();

        Ok(Redirect::temporary(url.as_str()))
    }
}
