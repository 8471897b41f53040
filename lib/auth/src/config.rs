//! Route configuration for the authentication dispatcher.
//!
//! Sub-prefixes are concatenated onto the root prefix to form the match
//! prefixes. Matching is a literal `starts_with`, not path-segment aware:
//! with the default root `/auth`, a request for `/authorization` is treated
//! as an auth-root path too. It falls through to the next handler unless it
//! also matches one of the sub-prefixes, so pick a root that does not collide
//! with application routes.

use axum::http::HeaderValue;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Path prefixes and outcome routes used by the dispatcher.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Root prefix for every auth route. Default: "/auth"
    #[serde(default = "default_route_prefix")]
    route_prefix: String,
    /// Provider callback sub-prefix. Default: "/callback"
    #[serde(default = "default_callback_prefix")]
    callback_prefix: String,
    /// Provider redirect sub-prefix. Default: "/redirect"
    #[serde(default = "default_redirect_prefix")]
    redirect_prefix: String,
    /// Logout sub-prefix. Default: "/logout"
    #[serde(default = "default_logout_prefix")]
    logout_prefix: String,
    /// Where unauthenticated users are sent. Default: "/login"
    #[serde(default = "default_login_route")]
    login_route: String,
    /// Where users land after signing in. Default: "/"
    #[serde(default = "default_login_redirect_route")]
    login_redirect_route: String,
    /// Where users land after signing out. Default: the login route.
    #[serde(default)]
    logout_route: Option<String>,
}

fn default_route_prefix() -> String {
    "/auth".to_string()
}

fn default_callback_prefix() -> String {
    "/callback".to_string()
}

fn default_redirect_prefix() -> String {
    "/redirect".to_string()
}

fn default_logout_prefix() -> String {
    "/logout".to_string()
}

fn default_login_route() -> String {
    "/login".to_string()
}

fn default_login_redirect_route() -> String {
    "/".to_string()
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            route_prefix: default_route_prefix(),
            callback_prefix: default_callback_prefix(),
            redirect_prefix: default_redirect_prefix(),
            logout_prefix: default_logout_prefix(),
            login_route: default_login_route(),
            login_redirect_route: default_login_redirect_route(),
            logout_route: None,
        }
    }
}

impl RouteConfig {
    /// Sets the root prefix.
    #[must_use]
    pub fn route_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.route_prefix = prefix.into();
        self
    }

    /// Sets the callback sub-prefix.
    #[must_use]
    pub fn callback_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.callback_prefix = prefix.into();
        self
    }

    /// Sets the redirect sub-prefix.
    #[must_use]
    pub fn redirect_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.redirect_prefix = prefix.into();
        self
    }

    /// Sets the logout sub-prefix.
    #[must_use]
    pub fn logout_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.logout_prefix = prefix.into();
        self
    }

    /// Sets the login route.
    #[must_use]
    pub fn login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    /// Sets the post-login redirect target.
    #[must_use]
    pub fn login_redirect_route(mut self, route: impl Into<String>) -> Self {
        self.login_redirect_route = route.into();
        self
    }

    /// Sets the post-logout redirect target.
    #[must_use]
    pub fn logout_route(mut self, route: impl Into<String>) -> Self {
        self.logout_route = Some(route.into());
        self
    }

    #[must_use]
    pub fn root(&self) -> &str {
        &self.route_prefix
    }

    /// Full prefix of the callback flow, e.g. `/auth/callback`.
    #[must_use]
    pub fn callback_root(&self) -> String {
        format!("{}{}", self.route_prefix, self.callback_prefix)
    }

    /// Full prefix of the redirect flow, e.g. `/auth/redirect`.
    #[must_use]
    pub fn redirect_root(&self) -> String {
        format!("{}{}", self.route_prefix, self.redirect_prefix)
    }

    /// Full logout path, e.g. `/auth/logout`.
    #[must_use]
    pub fn logout_path(&self) -> String {
        format!("{}{}", self.route_prefix, self.logout_prefix)
    }

    /// Callback path for a provider, e.g. `/auth/callback/github`.
    #[must_use]
    pub fn callback_path(&self, provider: &str) -> String {
        format!("{}/{}", self.callback_root(), provider)
    }

    /// Redirect path for a provider, e.g. `/auth/redirect/github`.
    #[must_use]
    pub fn redirect_path(&self, provider: &str) -> String {
        format!("{}/{}", self.redirect_root(), provider)
    }

    #[must_use]
    pub fn login(&self) -> &str {
        &self.login_route
    }

    #[must_use]
    pub fn login_redirect(&self) -> &str {
        &self.login_redirect_route
    }

    /// Post-logout target, falling back to the login route.
    #[must_use]
    pub fn logout_redirect(&self) -> &str {
        self.logout_route.as_deref().unwrap_or(&self.login_route)
    }

    /// Checks that routes are absolute paths that fit in a `Location` header,
    /// and that sub-prefixes do not shadow each other.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let routes: [(&'static str, &str); 7] = [
            ("route_prefix", self.route_prefix.as_str()),
            ("callback_prefix", self.callback_prefix.as_str()),
            ("redirect_prefix", self.redirect_prefix.as_str()),
            ("logout_prefix", self.logout_prefix.as_str()),
            ("login_route", self.login_route.as_str()),
            ("login_redirect_route", self.login_redirect_route.as_str()),
            ("logout_route", self.logout_redirect()),
        ];
        for (field, value) in routes {
            if !value.starts_with('/') || HeaderValue::from_str(value).is_err() {
                return Err(ConfigError::InvalidRoute {
                    field,
                    value: value.to_string(),
                });
            }
        }
        if self.route_prefix == "/" {
            return Err(ConfigError::InvalidRoute {
                field: "route_prefix",
                value: self.route_prefix.clone(),
            });
        }

        let subs: [(&'static str, &str); 3] = [
            ("logout_prefix", self.logout_prefix.as_str()),
            ("callback_prefix", self.callback_prefix.as_str()),
            ("redirect_prefix", self.redirect_prefix.as_str()),
        ];
        for (i, &(first, a)) in subs.iter().enumerate() {
            for &(second, b) in &subs[i + 1..] {
                if a.starts_with(b) || b.starts_with(a) {
                    return Err(ConfigError::OverlappingPrefixes { first, second });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RouteConfig::default();

        assert_eq!(config.root(), "/auth");
        assert_eq!(config.callback_root(), "/auth/callback");
        assert_eq!(config.redirect_root(), "/auth/redirect");
        assert_eq!(config.logout_path(), "/auth/logout");
        assert_eq!(config.login(), "/login");
        assert_eq!(config.login_redirect(), "/");
        assert_eq!(config.logout_redirect(), "/login");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn logout_route_overrides_login_route() {
        let config = RouteConfig::default().logout_route("/goodbye");
        assert_eq!(config.logout_redirect(), "/goodbye");
    }

    #[test]
    fn provider_paths() {
        let config = RouteConfig::default()
            .route_prefix("/login")
            .redirect_prefix("/oauth");

        assert_eq!(config.redirect_path("github"), "/login/oauth/github");
        assert_eq!(config.callback_path("github"), "/login/callback/github");
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = r#"{ "route_prefix": "/sso", "login_route": "/signin" }"#;
        let config: RouteConfig = serde_json::from_str(json).expect("deserialize");

        assert_eq!(config.root(), "/sso");
        assert_eq!(config.callback_root(), "/sso/callback");
        assert_eq!(config.logout_redirect(), "/signin");
    }

    #[test]
    fn rejects_relative_routes() {
        let config = RouteConfig::default().callback_prefix("callback");
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidRoute {
                field: "callback_prefix",
                value: "callback".to_string(),
            })
        );
    }

    #[test]
    fn rejects_routes_unusable_as_location() {
        for route in ["/login\n", "/home\r\nSet-Cookie: x=y", "/del\u{7f}"] {
            let config = RouteConfig::default().login_route(route);
            assert_eq!(
                config.validate(),
                Err(ConfigError::InvalidRoute {
                    field: "login_route",
                    value: route.to_string(),
                })
            );
        }

        let config = RouteConfig::default().logout_route("/bye\n");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRoute {
                field: "logout_route",
                ..
            })
        ));
    }

    #[test]
    fn rejects_bare_slash_root() {
        let config = RouteConfig::default().route_prefix("/");
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_overlapping_sub_prefixes() {
        let config = RouteConfig::default()
            .callback_prefix("/cb")
            .redirect_prefix("/cb-start");
        assert_eq!(
            config.validate(),
            Err(ConfigError::OverlappingPrefixes {
                first: "callback_prefix",
                second: "redirect_prefix",
            })
        );
    }
}
