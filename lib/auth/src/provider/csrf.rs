//! CSRF token handling shared by the OAuth providers.
//!
//! The redirect and callback requests of a flow are correlated only by a
//! random token held in a short-lived cookie. The token is taken (read and
//! expired) at the start of the callback, so it is single-use whatever the
//! outcome.

use axum::extract::Query;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use time::Duration as TimeDuration;

use crate::error::AuthError;
use crate::event::AuthEvent;

/// How long a CSRF token cookie lives.
const TOKEN_MAX_AGE_MINUTES: i64 = 10;

/// Query parameters an authorization server sends back.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Stores a freshly generated token in `cookie_name`.
pub(crate) fn store_token(event: &mut AuthEvent, cookie_name: &str, token: &str, secure: bool) {
    let cookie = Cookie::build((cookie_name.to_string(), token.to_string()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(TOKEN_MAX_AGE_MINUTES));
    event.set_cookie(cookie);
}

/// Reads the token from `cookie_name` and queues its deletion.
pub(crate) fn take_token(event: &mut AuthEvent, cookie_name: &str) -> Option<String> {
    let token = event
        .cookie(cookie_name)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    event.expire_cookie(cookie_name);
    token
}

/// Validates a callback against the expected token and returns the authorization code.
pub(crate) fn authorization_code(
    event: &AuthEvent,
    expected_state: Option<&str>,
    provider: &str,
) -> Result<String, AuthError> {
    let params = Query::<CallbackParams>::try_from_uri(event.uri())
        .map(|Query(params)| params)
        .map_err(|_| AuthError::MissingCallbackParam { param: "code" })?;

    if let Some(error) = params.error {
        let reason = match params.error_description {
            Some(description) => format!("{error}: {description}"),
            None => error,
        };
        return Err(AuthError::ProviderDenied {
            provider: provider.to_string(),
            reason,
        });
    }

    let state = params
        .state
        .ok_or(AuthError::MissingCallbackParam { param: "state" })?;
    let expected = expected_state.ok_or(AuthError::MissingState)?;
    if !bool::from(state.as_bytes().ct_eq(expected.as_bytes())) {
        return Err(AuthError::StateMismatch);
    }

    params
        .code
        .ok_or(AuthError::MissingCallbackParam { param: "code" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue, header};
    use axum_extra::extract::cookie::CookieJar;

    fn event(uri: &str, cookie: Option<&'static str>) -> AuthEvent {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = cookie {
            headers.insert(header::COOKIE, HeaderValue::from_static(cookie));
        }
        AuthEvent::new(
            uri.parse().expect("uri"),
            "http://example.com",
            CookieJar::from_headers(&headers),
        )
    }

    #[test]
    fn take_token_is_single_use() {
        let mut event = event("/auth/callback/github", Some("state=tok"));

        assert_eq!(take_token(&mut event, "state"), Some("tok".to_string()));
        assert_eq!(take_token(&mut event, "state"), None);
    }

    #[test]
    fn accepts_matching_state() {
        let event = event("/cb?code=abc&state=tok", None);
        assert_eq!(
            authorization_code(&event, Some("tok"), "github"),
            Ok("abc".to_string())
        );
    }

    #[test]
    fn rejects_mismatched_state() {
        let event = event("/cb?code=abc&state=forged", None);
        assert_eq!(
            authorization_code(&event, Some("tok"), "github"),
            Err(AuthError::StateMismatch)
        );
    }

    #[test]
    fn rejects_missing_cookie() {
        let event = event("/cb?code=abc&state=tok", None);
        assert_eq!(
            authorization_code(&event, None, "github"),
            Err(AuthError::MissingState)
        );
    }

    #[test]
    fn rejects_state_differing_in_length_or_last_byte() {
        for forged in ["to", "tok2", "toK", ""] {
            let event = event(&format!("/cb?code=abc&state={forged}"), None);
            assert_eq!(
                authorization_code(&event, Some("tok"), "github"),
                Err(AuthError::StateMismatch),
                "{forged}"
            );
        }
    }

    #[test]
    fn reports_upstream_error() {
        let event = event(
            "/cb?error=access_denied&error_description=denied&state=tok",
            None,
        );
        assert_eq!(
            authorization_code(&event, Some("tok"), "github"),
            Err(AuthError::ProviderDenied {
                provider: "github".to_string(),
                reason: "access_denied: denied".to_string(),
            })
        );
    }

    #[test]
    fn requires_code() {
        let event = event("/cb?state=tok", None);
        assert_eq!(
            authorization_code(&event, Some("tok"), "github"),
            Err(AuthError::MissingCallbackParam { param: "code" })
        );
    }
}
