//! Per-request context handed to providers and session strategies.

use axum::http::{HeaderMap, Uri, header};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration as TimeDuration;

/// The parts of an inbound request the auth flows need, plus the cookie
/// changes they queue for the response.
///
/// Cookie writes accumulate in an axum-extra [`CookieJar`] and are applied to
/// the terminal response in the order they were issued.
#[derive(Debug, Clone)]
pub struct AuthEvent {
    uri: Uri,
    origin: String,
    cookies: CookieJar,
}

impl AuthEvent {
    /// Creates an event from its parts.
    #[must_use]
    pub fn new(uri: Uri, origin: impl Into<String>, cookies: CookieJar) -> Self {
        Self {
            uri,
            origin: origin.into(),
            cookies,
        }
    }

    /// Builds an event from request headers.
    ///
    /// The origin is `public_origin` when configured, else the scheme and
    /// authority of an absolute request URI, else `X-Forwarded-Proto` and
    /// `Host` (scheme defaulting to `http`).
    #[must_use]
    pub fn from_request(uri: &Uri, headers: &HeaderMap, public_origin: Option<&str>) -> Self {
        let origin = match public_origin {
            Some(origin) => origin.trim_end_matches('/').to_string(),
            None => request_origin(uri, headers),
        };
        Self::new(uri.clone(), origin, CookieJar::from_headers(headers))
    }

    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Scheme and authority the client used, e.g. `https://example.com`.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Returns the value of a request cookie.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(Cookie::value)
    }

    #[must_use]
    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    /// Queues a cookie for the response.
    pub fn set_cookie(&mut self, cookie: impl Into<Cookie<'static>>) {
        let jar = std::mem::replace(&mut self.cookies, CookieJar::new());
        self.cookies = jar.add(cookie);
    }

    /// Queues an already-expired cookie, deleting `name` at path `/`.
    pub fn expire_cookie(&mut self, name: &str) {
        let removal = Cookie::build((name.to_string(), ""))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(TimeDuration::ZERO);
        self.set_cookie(removal);
    }

    /// Consumes the event, returning the jar to apply to the response.
    #[must_use]
    pub fn into_cookies(self) -> CookieJar {
        self.cookies
    }
}

fn request_origin(uri: &Uri, headers: &HeaderMap) -> String {
    if let (Some(scheme), Some(authority)) = (uri.scheme_str(), uri.authority()) {
        return format!("{scheme}://{authority}");
    }

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    format!("{scheme}://{host}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn origin_from_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("example.com"));
        let uri: Uri = "/auth/callback/github?code=abc".parse().expect("uri");

        let event = AuthEvent::from_request(&uri, &headers, None);

        assert_eq!(event.origin(), "http://example.com");
        assert_eq!(event.path(), "/auth/callback/github");
    }

    #[test]
    fn origin_honors_forwarded_proto() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("example.com"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https, http"));
        let uri: Uri = "/".parse().expect("uri");

        let event = AuthEvent::from_request(&uri, &headers, None);

        assert_eq!(event.origin(), "https://example.com");
    }

    #[test]
    fn configured_origin_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("internal:8080"));
        let uri: Uri = "http://internal:8080/auth".parse().expect("uri");

        let event = AuthEvent::from_request(&uri, &headers, Some("https://app.example.com/"));

        assert_eq!(event.origin(), "https://app.example.com");
    }

    #[test]
    fn absolute_uri_origin() {
        let uri: Uri = "http://example.com/auth/logout".parse().expect("uri");
        let event = AuthEvent::from_request(&uri, &HeaderMap::new(), None);
        assert_eq!(event.origin(), "http://example.com");
    }

    #[test]
    fn reads_request_cookies_and_queues_changes() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("state=abc; other=1"));
        let uri: Uri = "/".parse().expect("uri");

        let mut event = AuthEvent::from_request(&uri, &headers, None);
        assert_eq!(event.cookie("state"), Some("abc"));

        event.expire_cookie("state");
        event.set_cookie(Cookie::new("jwt", "token"));

        let jar = event.into_cookies();
        assert_eq!(jar.get("jwt").map(Cookie::value), Some("token"));
        assert_eq!(jar.get("state").map(Cookie::value), Some(""));
    }
}
