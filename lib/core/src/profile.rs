//! Identity profiles produced by identity providers.

use serde::{Deserialize, Serialize};

/// Identity asserted by a provider after a successful callback verification.
///
/// The pair of [`provider`](Self::provider) and [`provider_id`](Self::provider_id)
/// identifies a principal. The email address is always present, even when the
/// provider does not vouch for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Subject identifier, unique within the provider.
    provider_id: String,
    /// Registry name of the provider that produced this profile.
    provider: String,
    /// Login handle, if the provider has one.
    username: Option<String>,
    /// Display name.
    name: Option<String>,
    /// Email address.
    email: String,
}

impl Profile {
    /// Creates a profile with the required fields.
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        provider_id: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            provider: provider.into(),
            username: None,
            name: None,
            email: email.into(),
        }
    }

    /// Sets the username.
    #[must_use]
    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
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

    /// Returns the subject string used for credentials: `provider_providerId`.
    #[must_use]
    pub fn subject(&self) -> String {
        format!("{}_{}", self.provider, self.provider_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_builder() {
        let profile = Profile::new("github", "123321", "test@example.com")
            .with_username(Some("octocat".to_string()))
            .with_name(Some("The Octocat".to_string()));

        assert_eq!(profile.provider(), "github");
        assert_eq!(profile.provider_id(), "123321");
        assert_eq!(profile.email(), "test@example.com");
        assert_eq!(profile.username(), Some("octocat"));
        assert_eq!(profile.name(), Some("The Octocat"));
    }

    #[test]
    fn subject_joins_provider_and_id() {
        let profile = Profile::new("google", "10769150350006150715113082367", "a@b.c");
        assert_eq!(profile.subject(), "google_10769150350006150715113082367");
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let profile = Profile::new("github", "1", "a@b.c");
        let json = serde_json::to_value(&profile).expect("serialize");

        assert_eq!(json["providerId"], "1");
        assert_eq!(json["provider"], "github");
        assert!(json["username"].is_null());
    }
}
