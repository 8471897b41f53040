//! Session strategies: how a verified profile becomes a credential the
//! client carries, and how that credential is read back.

pub mod jwt;

pub use jwt::{JwtStrategy, JwtStrategyConfig};

use async_trait::async_trait;
use axum_extra::extract::cookie::CookieJar;
use gatehouse_core::{Profile, Session};

use crate::error::AuthError;
use crate::event::AuthEvent;

/// Issues, reads and revokes session credentials.
#[async_trait]
pub trait SessionStrategy: Send + Sync {
    /// Encodes `profile` into a credential and queues it on the event's cookies.
    async fn store(&self, event: &mut AuthEvent, profile: &Profile) -> Result<(), AuthError>;

    /// Decodes the credential in `cookies`.
    ///
    /// Any verification failure yields `None`; an invalid credential is
    /// treated the same as no credential.
    async fn get_session(&self, cookies: &CookieJar) -> Option<Session>;

    /// Queues deletion of the credential. Safe to call without one.
    async fn destroy_session(&self, event: &mut AuthEvent);
}
