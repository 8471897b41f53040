//! Sessions decoded from signed credentials.
//!
//! A session is the read side of a stored [`Profile`]: the identity fields a
//! session strategy wrote into a credential, plus the issuance metadata that
//! bounds how long the credential is honored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::profile::Profile;

/// Represents a signed-in principal for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Subject claim, `provider_providerId`.
    subject: String,
    provider_id: String,
    provider: String,
    username: Option<String>,
    name: Option<String>,
    email: String,
    /// Who issued the credential.
    issuer: String,
    /// When the credential was issued.
    issued_at: DateTime<Utc>,
    /// When the credential stops being honored.
    expires_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session for a profile issued at `issued_at` and valid until `expires_at`.
    #[must_use]
    pub fn from_profile(
        profile: &Profile,
        issuer: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            subject: profile.subject(),
            provider_id: profile.provider_id().to_string(),
            provider: profile.provider().to_string(),
            username: profile.username().map(str::to_string),
            name: profile.name().map(str::to_string),
            email: profile.email().to_string(),
            issuer: issuer.into(),
            issued_at,
            expires_at,
        }
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns true if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Returns true if this session carries the identity of `profile`.
    #[must_use]
    pub fn matches(&self, profile: &Profile) -> bool {
        self.provider == profile.provider()
            && self.provider_id == profile.provider_id()
            && self.email == profile.email()
    }

    /// Rebuilds the profile this session was created from.
    #[must_use]
    pub fn profile(&self) -> Profile {
        Profile::new(&self.provider, &self.provider_id, &self.email)
            .with_username(self.username.clone())
            .with_name(self.name.clone())
    }
}
