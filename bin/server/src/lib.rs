//! Host server for the gatehouse authentication middleware.
//!
//! Wires the configured identity providers and the JWT session strategy into
//! an axum router. The auth middleware wraps every route, so any handler can
//! read the current session through a [`gatehouse_auth::SessionAccessor`].

pub mod app;
pub mod audit;
pub mod config;
pub mod error;
