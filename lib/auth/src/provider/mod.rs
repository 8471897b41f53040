//! Identity providers.
//!
//! Every provider can verify a callback into a [`Profile`]. Providers that
//! drive an OAuth authorization-code flow also implement [`OAuthProvider`]
//! and advertise it through [`AuthProvider::oauth`], which is how the
//! dispatcher decides whether a redirect request can be served.

mod csrf;
pub mod github;
pub mod google;

pub use github::{GithubConfig, GithubEndpoints, GithubProvider};
pub use google::{GoogleConfig, GoogleProvider};

use async_trait::async_trait;
use axum::response::Redirect;
use gatehouse_core::Profile;
use std::sync::Arc;

use crate::error::{AuthError, ConfigError};
use crate::event::AuthEvent;

/// A pluggable identity source.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Registry name, matched exactly against the path segment.
    fn name(&self) -> &str;

    /// Verifies a provider callback and produces the asserted identity.
    ///
    /// Implementations check their anti-forgery token before trusting the
    /// exchange and never return a partially populated profile.
    async fn verify(&self, event: &mut AuthEvent, callback_uri: &str)
    -> Result<Profile, AuthError>;

    /// Returns the redirect capability, if this provider has one.
    fn oauth(&self) -> Option<&dyn OAuthProvider> {
        None
    }
}

/// A provider that starts its flow by redirecting to an authorization server.
#[async_trait]
pub trait OAuthProvider: AuthProvider {
    /// Generates a CSRF token, stores it in a cookie, and redirects (307) to
    /// the authorization URL carrying the token and `callback_uri`.
    async fn redirect_to_provider(
        &self,
        event: &mut AuthEvent,
        callback_uri: &str,
    ) -> Result<Redirect, AuthError>;
}

/// Ordered set of providers with unique names.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn AuthProvider>>,
}

impl ProviderRegistry {
    /// Creates a registry, rejecting duplicate names.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateProvider` if two providers share a name.
    pub fn new(providers: Vec<Arc<dyn AuthProvider>>) -> Result<Self, ConfigError> {
        for (i, provider) in providers.iter().enumerate() {
            if providers[..i].iter().any(|p| p.name() == provider.name()) {
                return Err(ConfigError::DuplicateProvider {
                    name: provider.name().to_string(),
                });
            }
        }
        Ok(Self { providers })
    }

    /// Looks a provider up by exact, case-sensitive name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn AuthProvider>> {
        self.providers.iter().find(|p| p.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn AuthProvider>> {
        self.providers.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.providers.iter().map(|p| p.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl AuthProvider for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn verify(&self, _: &mut AuthEvent, _: &str) -> Result<Profile, AuthError> {
            Ok(Profile::new(self.0, "1", "a@example.com"))
        }
    }

    fn registry(names: &[&'static str]) -> Result<ProviderRegistry, ConfigError> {
        ProviderRegistry::new(
            names
                .iter()
                .map(|n| Arc::new(Named(n)) as Arc<dyn AuthProvider>)
                .collect(),
        )
    }

    #[test]
    fn lookup_is_exact() {
        let registry = registry(&["github", "google"]).expect("registry");

        assert_eq!(registry.len(), 2);
        assert!(registry.get("github").is_some());
        assert!(registry.get("GitHub").is_none());
        assert!(registry.get("git").is_none());
        assert!(registry.get("github2").is_none());
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = registry(&["github", "google", "github"]).expect_err("duplicate");
        assert_eq!(
            err,
            ConfigError::DuplicateProvider {
                name: "github".to_string()
            }
        );
    }

    #[test]
    fn plain_providers_have_no_redirect() {
        let registry = registry(&["ldap"]).expect("registry");
        let provider = registry.get("ldap").expect("present");
        assert!(provider.oauth().is_none());
    }
}
