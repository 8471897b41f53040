//! Login hook that records each successful sign-in.

use async_trait::async_trait;
use gatehouse_auth::{AuthEvent, HookError, LoginHook};
use gatehouse_core::Profile;

/// Logs sign-ins at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoginAudit;

#[async_trait]
impl LoginHook for LoginAudit {
    async fn on_login(&self, event: &AuthEvent, profile: &Profile) -> Result<(), HookError> {
        tracing::info!(
            provider = %profile.provider(),
            subject = %profile.subject(),
            origin = %event.origin(),
            "login recorded"
        );
        Ok(())
    }
}
