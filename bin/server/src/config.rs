//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested keys:
//! - `LISTEN_ADDR`, `PUBLIC_ORIGIN`
//! - `ROUTES__ROUTE_PREFIX`, `ROUTES__LOGIN_ROUTE`, ... (see [`RouteConfig`])
//! - `SESSION__AUTH_KEY`, `SESSION__ISSUER`, ... (see [`JwtStrategyConfig`])
//! - `GITHUB__CLIENT_ID`, `GITHUB__CLIENT_SECRET`
//! - `GOOGLE__CLIENT_ID`, `GOOGLE__CLIENT_SECRET`, `GOOGLE__METADATA_TTL_SECONDS`
//!
//! A provider is enabled when its section is present.

use gatehouse_auth::{GithubConfig, GoogleConfig, JwtStrategyConfig, RouteConfig};
use serde::Deserialize;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on. Default: "127.0.0.1:3000"
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Externally visible origin, e.g. `https://app.example.com`, used to
    /// build OAuth callback URIs. Derived from each request when unset.
    #[serde(default)]
    pub public_origin: Option<String>,

    #[serde(default)]
    pub routes: RouteConfig,

    /// Session cookie signing.
    pub session: JwtStrategyConfig,

    #[serde(default)]
    pub github: Option<GithubConfig>,

    #[serde(default)]
    pub google: Option<GoogleConfig>,
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_environment(config::Environment::default())
    }

    fn from_environment(environment: config::Environment) -> Result<Self, config::ConfigError> {
        // Values stay strings so hex keys are never read as numbers.
        config::Config::builder()
            .add_source(environment.separator("__"))
            .build()?
            .try_deserialize()
    }
}
