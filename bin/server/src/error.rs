//! Errors that stop the server from starting.

use gatehouse_auth::ConfigError;
use std::fmt;

/// Errors that stop the server from starting.
#[derive(Debug)]
pub enum StartupError {
    /// Environment configuration could not be loaded.
    Config {
        /// Error details.
        details: String,
    },
    /// The auth configuration is invalid.
    Auth(ConfigError),
    /// The listen address could not be bound.
    Bind {
        /// The configured listen address.
        addr: String,
        /// Error details.
        details: String,
    },
    /// The server stopped with an I/O error.
    Serve {
        /// Error details.
        details: String,
    },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "failed to load configuration: {details}"),
            Self::Auth(err) => write!(f, "invalid auth configuration: {err}"),
            Self::Bind { addr, details } => write!(f, "failed to bind {addr}: {details}"),
            Self::Serve { details } => write!(f, "server error: {details}"),
        }
    }
}

impl std::error::Error for StartupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Auth(err) => Some(err),
            _ => None,
        }
    }
}
