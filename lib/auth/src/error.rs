//! Error types for the auth crate.
//!
//! - `AuthError`: request-time failures, each mapped to a terminal HTTP response
//! - `ConfigError`: invalid configuration detected while assembling the dispatcher

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

/// Errors raised while handling an authentication request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No provider is registered under the requested name.
    UnknownProvider {
        /// The path segment, if there was one.
        name: Option<String>,
    },
    /// The provider exists but has no redirect flow.
    RedirectUnsupported {
        /// Registry name of the provider.
        provider: String,
    },
    /// The callback URI derived from the request origin is not a valid URL.
    InvalidCallbackUri {
        /// The rejected URI.
        uri: String,
    },
    /// The callback is missing a required query parameter.
    MissingCallbackParam {
        /// Name of the missing parameter.
        param: &'static str,
    },
    /// No CSRF token cookie accompanied the callback.
    MissingState,
    /// The callback state does not match the CSRF token cookie.
    StateMismatch,
    /// The identity provider reported an error instead of a grant.
    ProviderDenied {
        /// Registry name of the provider.
        provider: String,
        /// The `error` and `error_description` it sent.
        reason: String,
    },
    /// Exchanging the authorization code failed.
    TokenExchange {
        /// Registry name of the provider.
        provider: String,
        /// Error details.
        reason: String,
    },
    /// Fetching or validating the user's profile failed.
    ProfileFetch {
        /// Registry name of the provider.
        provider: String,
        /// Error details.
        reason: String,
    },
    /// The provider returned no usable email address.
    MissingEmail {
        /// Registry name of the provider.
        provider: String,
    },
    /// Provider metadata discovery failed.
    Discovery {
        /// Registry name of the provider.
        provider: String,
        /// Error details.
        reason: String,
    },
    /// Encoding the session credential failed.
    SessionEncoding {
        /// Error details.
        reason: String,
    },
    /// The login hook failed.
    Hook {
        /// Error details.
        reason: String,
    },
}

impl AuthError {
    /// Returns the HTTP status this error terminates a request with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownProvider { .. }
            | Self::RedirectUnsupported { .. }
            | Self::InvalidCallbackUri { .. }
            | Self::MissingCallbackParam { .. }
            | Self::MissingState
            | Self::StateMismatch
            | Self::MissingEmail { .. } => StatusCode::BAD_REQUEST,
            Self::ProviderDenied { .. }
            | Self::TokenExchange { .. }
            | Self::ProfileFetch { .. } => StatusCode::FORBIDDEN,
            Self::Discovery { .. } => StatusCode::BAD_GATEWAY,
            Self::SessionEncoding { .. } | Self::Hook { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownProvider { name: Some(name) } => {
                write!(f, "unknown provider '{name}'")
            }
            Self::UnknownProvider { name: None } => write!(f, "no provider in path"),
            Self::RedirectUnsupported { provider } => {
                write!(f, "provider '{provider}' does not support redirects")
            }
            Self::InvalidCallbackUri { uri } => write!(f, "invalid callback URI '{uri}'"),
            Self::MissingCallbackParam { param } => {
                write!(f, "callback is missing '{param}'")
            }
            Self::MissingState => write!(f, "missing CSRF state cookie"),
            Self::StateMismatch => write!(f, "CSRF state mismatch"),
            Self::ProviderDenied { provider, reason } => {
                write!(f, "provider '{provider}' denied the request: {reason}")
            }
            Self::TokenExchange { provider, reason } => {
                write!(f, "token exchange with '{provider}' failed: {reason}")
            }
            Self::ProfileFetch { provider, reason } => {
                write!(f, "fetching profile from '{provider}' failed: {reason}")
            }
            Self::MissingEmail { provider } => {
                write!(f, "provider '{provider}' returned no email address")
            }
            Self::Discovery { provider, reason } => {
                write!(f, "discovery for '{provider}' failed: {reason}")
            }
            Self::SessionEncoding { reason } => {
                write!(f, "failed to encode session: {reason}")
            }
            Self::Hook { reason } => write!(f, "login hook failed: {reason}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // Routing misses are client errors with no body.
            Self::UnknownProvider { .. } | Self::RedirectUnsupported { .. } => {
                tracing::debug!(error = %self, "rejecting auth request");
                return status.into_response();
            }
            Self::InvalidCallbackUri { .. } | Self::MissingCallbackParam { .. } => {
                "Invalid callback"
            }
            Self::MissingState => "Missing authentication state",
            Self::StateMismatch => "Invalid request state",
            Self::MissingEmail { .. } => "No email address available",
            Self::ProviderDenied { .. } | Self::TokenExchange { .. } | Self::ProfileFetch { .. } => {
                tracing::warn!(error = %self, "authentication failed");
                "Authentication failed"
            }
            Self::Discovery { .. } => {
                tracing::error!(error = %self, "identity provider unavailable");
                "Identity provider unavailable"
            }
            Self::SessionEncoding { .. } | Self::Hook { .. } => {
                tracing::error!(error = %self, "login could not be completed");
                "Internal server error"
            }
        };

        (status, message).into_response()
    }
}

/// Errors from validating configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Two providers share a name.
    DuplicateProvider {
        /// The repeated name.
        name: String,
    },
    /// A route or prefix is malformed.
    InvalidRoute {
        /// Name of the offending setting.
        field: &'static str,
        /// The rejected value.
        value: String,
    },
    /// One sub-prefix is a literal prefix of another.
    OverlappingPrefixes {
        /// The first overlapping setting.
        first: &'static str,
        /// The second overlapping setting.
        second: &'static str,
    },
    /// A required setting is empty.
    Missing {
        /// Name of the setting.
        field: &'static str,
    },
    /// The session signing key is unusable.
    InvalidKey {
        /// Error details.
        reason: String,
    },
    /// The session lifetime is out of range.
    InvalidTtl {
        /// The rejected lifetime.
        seconds: i64,
    },
    /// A configured URL does not parse.
    InvalidUrl {
        /// Name of the setting.
        field: &'static str,
        /// Error details.
        reason: String,
    },
    /// The outbound HTTP client could not be built.
    HttpClient {
        /// Error details.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateProvider { name } => {
                write!(f, "provider '{name}' is registered more than once")
            }
            Self::InvalidRoute { field, value } => {
                write!(f, "invalid {field} '{value}': must be an absolute path")
            }
            Self::OverlappingPrefixes { first, second } => {
                write!(f, "{first} and {second} overlap")
            }
            Self::Missing { field } => write!(f, "{field} must be set"),
            Self::InvalidKey { reason } => write!(f, "invalid signing key: {reason}"),
            Self::InvalidTtl { seconds } => {
                write!(f, "session ttl_seconds {seconds} must be between 1 second and one year")
            }
            Self::InvalidUrl { field, reason } => write!(f, "invalid {field}: {reason}"),
            Self::HttpClient { reason } => write!(f, "failed to build HTTP client: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_misses_are_bad_requests() {
        assert_eq!(
            AuthError::UnknownProvider { name: None }.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::RedirectUnsupported {
                provider: "ldap".to_string()
            }
            .status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn routing_miss_response_has_no_body() {
        let response = AuthError::UnknownProvider {
            name: Some("does-not-exist".to_string()),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        assert!(body.is_empty());
    }

    #[test]
    fn upstream_failures_are_client_visible() {
        let err = AuthError::TokenExchange {
            provider: "github".to_string(),
            reason: "bad_verification_code".to_string(),
        };
        assert!(err.status().is_client_error());
        assert!(err.to_string().contains("github"));
        assert!(err.to_string().contains("bad_verification_code"));
    }

    #[test]
    fn hook_failure_is_server_error() {
        let err = AuthError::Hook {
            reason: "database down".to_string(),
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::OverlappingPrefixes {
            first: "callback_prefix",
            second: "redirect_prefix",
        };
        assert!(err.to_string().contains("callback_prefix"));
        assert!(err.to_string().contains("overlap"));

        let err = ConfigError::InvalidTtl { seconds: 0 };
        assert!(err.to_string().contains("ttl_seconds 0"));
    }
}
