//! Core domain types for gatehouse.
//!
//! This crate provides the identity records exchanged between identity
//! providers, session strategies and request handlers:
//! - `Profile`: the identity asserted by a provider after verification
//! - `Session`: a profile decoded back out of a signed credential
//!
//! Nothing here knows about HTTP; see `gatehouse-auth` for the dispatcher.

pub mod error;
pub mod profile;
pub mod session;

pub use error::Result;
pub use profile::Profile;
pub use session::Session;
