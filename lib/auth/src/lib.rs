//! Authentication dispatch middleware for axum.
//!
//! This crate provides:
//! - `AuthDispatcher`: classifies requests into pass-through, OAuth redirect,
//!   OAuth callback and logout, and drives each flow
//! - `AuthProvider` / `OAuthProvider`: pluggable identity sources, with
//!   GitHub (OAuth 2.0) and Google (OpenID Connect) implementations
//! - `SessionStrategy`: session credentials, with a signed JWT cookie implementation
//! - `SessionAccessor`, `RequireSession`, `require_session`: session access
//!   for downstream handlers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use axum::{Router, middleware, routing::get};
//! use gatehouse_auth::{
//!     AuthDispatcher, JwtStrategy, JwtStrategyConfig, RequireSession, auth_middleware,
//! };
//!
//! # fn main() -> Result<(), gatehouse_auth::ConfigError> {
//! let strategy = JwtStrategy::new(JwtStrategyConfig::new(
//!     "00112233445566778899aabbccddeeff",
//!     "my-app",
//! ))?;
//! let dispatcher = Arc::new(AuthDispatcher::builder(Arc::new(strategy)).build()?);
//!
//! async fn me(RequireSession(session): RequireSession) -> String {
//!     session.email().to_string()
//! }
//!
//! let app: Router = Router::new()
//!     .route("/me", get(me))
//!     .layer(middleware::from_fn_with_state(dispatcher, auth_middleware));
//! # Ok(())
//! # }
//! ```

pub mod accessor;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod provider;
pub mod strategy;

pub use accessor::{
    AuthMetadata, AuthRejection, ProviderLink, RequireSession, SessionAccessor, require_session,
};
pub use config::RouteConfig;
pub use dispatcher::{
    AuthDispatcher, AuthDispatcherBuilder, HookError, LoginHook, auth_middleware,
};
pub use error::{AuthError, ConfigError};
pub use event::AuthEvent;
pub use provider::{
    AuthProvider, GithubConfig, GithubEndpoints, GithubProvider, GoogleConfig, GoogleProvider,
    OAuthProvider, ProviderRegistry,
};
pub use strategy::{JwtStrategy, JwtStrategyConfig, SessionStrategy};
