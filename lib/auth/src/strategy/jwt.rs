//! Signed JWT session cookies (HS256).

use async_trait::async_trait;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Duration, Utc};
use gatehouse_core::{Profile, Session};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::Duration as TimeDuration;

use super::SessionStrategy;
use crate::error::{AuthError, ConfigError};
use crate::event::AuthEvent;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Longest accepted token lifetime: one year.
const MAX_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

/// JWT session configuration.
///
/// Loaded from the `SESSION__*` environment variables by the server.
#[derive(Clone, Deserialize)]
pub struct JwtStrategyConfig {
    /// Hex-encoded HMAC key.
    auth_key: String,
    /// Value of the `iss` claim, required on decode.
    issuer: String,
    /// Default: "jwt"
    #[serde(default = "default_cookie_name")]
    cookie_name: String,
    /// Token lifetime, at most one year. Default: one day
    #[serde(default = "default_ttl_seconds")]
    ttl_seconds: i64,
    /// Default: true
    #[serde(default = "default_secure_cookies")]
    secure_cookies: bool,
}

fn default_cookie_name() -> String {
    "jwt".to_string()
}

fn default_ttl_seconds() -> i64 {
    24 * 60 * 60
}

fn default_secure_cookies() -> bool {
    true
}

impl JwtStrategyConfig {
    #[must_use]
    pub fn new(auth_key: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            auth_key: auth_key.into(),
            issuer: issuer.into(),
            cookie_name: default_cookie_name(),
            ttl_seconds: default_ttl_seconds(),
            secure_cookies: default_secure_cookies(),
        }
    }

    #[must_use]
    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn ttl_seconds(mut self, ttl: i64) -> Self {
        self.ttl_seconds = ttl;
        self
    }

    #[must_use]
    pub fn secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }
}

impl std::fmt::Debug for JwtStrategyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtStrategyConfig")
            .field("auth_key", &"[redacted]")
            .field("issuer", &self.issuer)
            .field("cookie_name", &self.cookie_name)
            .field("ttl_seconds", &self.ttl_seconds)
            .field("secure_cookies", &self.secure_cookies)
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionClaims {
    sub: String,
    iss: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<i64>,
    exp: i64,
    provider_id: String,
    provider: String,
    username: Option<String>,
    name: Option<String>,
    email: String,
}

/// Keeps the session in a signed, http-only cookie.
pub struct JwtStrategy {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    cookie_name: String,
    ttl: Duration,
    secure_cookies: bool,
}

impl JwtStrategy {
    /// Creates a strategy from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not non-empty hex, the issuer is empty,
    /// or the lifetime is not between one second and one year.
    pub fn new(config: JwtStrategyConfig) -> Result<Self, ConfigError> {
        let key = hex::decode(config.auth_key.trim()).map_err(|e| ConfigError::InvalidKey {
            reason: e.to_string(),
        })?;
        if key.is_empty() {
            return Err(ConfigError::Missing {
                field: "session auth_key",
            });
        }
        if config.issuer.is_empty() {
            return Err(ConfigError::Missing {
                field: "session issuer",
            });
        }
        if !(1..=MAX_TTL_SECONDS).contains(&config.ttl_seconds) {
            return Err(ConfigError::InvalidTtl {
                seconds: config.ttl_seconds,
            });
        }

        let mut validation = Validation::new(ALGORITHM);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&key),
            decoding_key: DecodingKey::from_secret(&key),
            validation,
            issuer: config.issuer,
            cookie_name: config.cookie_name,
            ttl: Duration::seconds(config.ttl_seconds),
            secure_cookies: config.secure_cookies,
        })
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Signs a credential for `profile` issued at `now`.
    fn encode(&self, profile: &Profile, now: DateTime<Utc>) -> Result<String, AuthError> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::SessionEncoding {
                reason: "expiry out of range".to_string(),
            })?;
        let claims = SessionClaims {
            sub: profile.subject(),
            iss: self.issuer.clone(),
            iat: Some(now.timestamp()),
            exp: expires_at.timestamp(),
            provider_id: profile.provider_id().to_string(),
            provider: profile.provider().to_string(),
            username: profile.username().map(str::to_string),
            name: profile.name().map(str::to_string),
            email: profile.email().to_string(),
        };

        jsonwebtoken::encode(&Header::new(ALGORITHM), &claims, &self.encoding_key).map_err(|e| {
            AuthError::SessionEncoding {
                reason: e.to_string(),
            }
        })
    }

    /// Verifies a credential and rebuilds the session it carries.
    fn decode(&self, token: &str) -> Option<Session> {
        let claims = match jsonwebtoken::decode::<SessionClaims>(
            token,
            &self.decoding_key,
            &self.validation,
        ) {
            Ok(data) => data.claims,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring invalid session credential");
                return None;
            }
        };

        let profile = Profile::new(claims.provider, claims.provider_id, claims.email)
            .with_username(claims.username)
            .with_name(claims.name);
        if claims.sub != profile.subject() {
            tracing::debug!(sub = %claims.sub, "session subject does not match its identity claims");
            return None;
        }

        let expires_at = DateTime::from_timestamp(claims.exp, 0)?;
        let issued_at = match claims.iat {
            Some(iat) => DateTime::from_timestamp(iat, 0)?,
            None => expires_at.checked_sub_signed(self.ttl)?,
        };

        Some(Session::from_profile(
            &profile,
            claims.iss,
            issued_at,
            expires_at,
        ))
    }
}

impl std::fmt::Debug for JwtStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtStrategy")
            .field("issuer", &self.issuer)
            .field("cookie_name", &self.cookie_name)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionStrategy for JwtStrategy {
    async fn store(&self, event: &mut AuthEvent, profile: &Profile) -> Result<(), AuthError> {
        let token = self.encode(profile, Utc::now())?;

        let cookie = Cookie::build((self.cookie_name.clone(), token))
            .path("/")
            .http_only(true)
            .secure(self.secure_cookies)
            .same_site(SameSite::Lax)
            .max_age(TimeDuration::seconds(self.ttl.num_seconds()));
        event.set_cookie(cookie);

        tracing::debug!(subject = %profile.subject(), "session stored");
        Ok(())
    }

    async fn get_session(&self, cookies: &CookieJar) -> Option<Session> {
        let token = cookies.get(&self.cookie_name)?.value();
        if token.is_empty() {
            return None;
        }
        self.decode(token)
    }

    async fn destroy_session(&self, event: &mut AuthEvent) {
        event.expire_cookie(&self.cookie_name);
    }
}
