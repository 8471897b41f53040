//! Router and handlers of the host application.

use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use gatehouse_auth::{
    AuthDispatcher, AuthMetadata, GithubProvider, GoogleProvider, JwtStrategy, RequireSession,
    SessionAccessor, auth_middleware, require_session,
};
use gatehouse_core::Session;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::audit::LoginAudit;
use crate::config::ServerConfig;
use crate::error::StartupError;

/// Builds the dispatcher for the configured providers.
///
/// # Errors
///
/// Returns an error if the session key, a provider, or the routes are invalid.
pub fn build_dispatcher(
    config: &ServerConfig,
) -> gatehouse_core::Result<AuthDispatcher, StartupError> {
    let strategy = JwtStrategy::new(config.session.clone()).map_err(StartupError::Auth)?;

    let mut builder = AuthDispatcher::builder(Arc::new(strategy))
        .routes(config.routes.clone())
        .login_hook(Arc::new(LoginAudit));

    if let Some(origin) = &config.public_origin {
        builder = builder.public_origin(origin.clone());
    }
    if let Some(github) = &config.github {
        let provider = GithubProvider::new(github.clone()).map_err(StartupError::Auth)?;
        builder = builder.provider(Arc::new(provider));
        tracing::info!(provider = "github", "provider enabled");
    }
    if let Some(google) = &config.google {
        let provider = GoogleProvider::new(google.clone()).map_err(StartupError::Auth)?;
        builder = builder.provider(Arc::new(provider));
        tracing::info!(provider = "google", "provider enabled");
    }
    if config.github.is_none() && config.google.is_none() {
        tracing::warn!("no identity providers configured; nobody can sign in");
    }

    Ok(builder.build().map_err(StartupError::Auth)?)
}

/// Creates the application router with the auth middleware in front of every route.
pub fn router(dispatcher: Arc<AuthDispatcher>) -> Router {
    let routes = dispatcher.routes();

    let protected = Router::new()
        .route("/account", get(account))
        .route_layer(middleware::from_fn(require_session));

    let mut app = Router::new()
        .route("/", get(index))
        .route("/me", get(me))
        .route(&format!("{}/metadata", routes.root()), get(metadata));
    if routes.login() != "/" {
        app = app.route(routes.login(), get(login));
    }

    app.merge(protected)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(dispatcher, auth_middleware))
        .layer(TraceLayer::new_for_http())
}

/// What a front end needs to render auth state.
#[derive(Debug, Serialize)]
struct PageData {
    session: Option<Session>,
    auth: AuthMetadata,
}

async fn index(accessor: SessionAccessor) -> Json<PageData> {
    Json(PageData {
        session: accessor.session().await,
        auth: accessor.metadata().clone(),
    })
}

async fn login(accessor: SessionAccessor) -> Html<String> {
    let links: String = accessor
        .metadata()
        .providers()
        .iter()
        .filter_map(|provider| {
            provider.redirect_path.as_ref().map(|path| {
                format!(
                    "<li><a href=\"{path}\">Sign in with {}</a></li>",
                    provider.name
                )
            })
        })
        .collect();

    Html(format!(
        "<!DOCTYPE html><html><body><h1>Sign in</h1><ul>{links}</ul></body></html>"
    ))
}

async fn me(RequireSession(session): RequireSession) -> Json<Session> {
    Json(session)
}

async fn metadata(accessor: SessionAccessor) -> Json<AuthMetadata> {
    Json(accessor.metadata().clone())
}

/// Only reachable with a session; see `require_session`.
async fn account(accessor: SessionAccessor) -> Response {
    match accessor.session().await {
        Some(session) => Json(session.profile()).into_response(),
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::Request,
        http::{HeaderValue, header},
    };
    use axum_extra::extract::cookie::CookieJar;
    use gatehouse_auth::{AuthEvent, JwtStrategyConfig, SessionStrategy};
    use gatehouse_core::Profile;
    use tower::ServiceExt;

    const KEY: &str = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";

    fn config() -> ServerConfig {
        serde_json::from_value(serde_json::json!({
            "session": {
                "auth_key": KEY,
                "issuer": "gatehouse-test",
                "secure_cookies": false,
            },
            "github": {
                "client_id": "client",
                "client_secret": "secret",
            },
        }))
        .expect("config")
    }

    fn app() -> Router {
        let dispatcher = build_dispatcher(&config()).expect("dispatcher");
        router(Arc::new(dispatcher))
    }

    async fn credential() -> String {
        let strategy = JwtStrategy::new(JwtStrategyConfig::new(KEY, "gatehouse-test"))
            .expect("strategy");
        let mut event = AuthEvent::new(
            "/auth/callback/github".parse().expect("uri"),
            "http://localhost",
            CookieJar::new(),
        );
        strategy
            .store(
                &mut event,
                &Profile::new("github", "123321", "test@example.com"),
            )
            .await
            .expect("store");
        event
            .into_cookies()
            .get("jwt")
            .map(|c| c.value().to_string())
            .expect("credential")
    }

    fn request(path: &str, credential: Option<&str>) -> Request {
        let mut request = Request::builder()
            .uri(path)
            .header(header::HOST, "localhost")
            .body(Body::empty())
            .expect("request");
        if let Some(credential) = credential {
            request.headers_mut().insert(
                header::COOKIE,
                HeaderValue::from_str(&format!("jwt={credential}")).expect("cookie"),
            );
        }
        request
    }

    async fn json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn index_reports_anonymous_visitor() {
        let response = app().oneshot(request("/", None)).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert!(body["session"].is_null());
        assert_eq!(
            body["auth"]["providers"][0]["redirect_path"],
            "/auth/redirect/github"
        );
    }

    #[tokio::test]
    async fn index_reports_signed_in_user() {
        let credential = credential().await;
        let response = app()
            .oneshot(request("/", Some(&credential)))
            .await
            .expect("response");

        let body = json(response).await;
        assert_eq!(body["session"]["email"], "test@example.com");
        assert_eq!(body["session"]["providerId"], "123321");
    }

    #[tokio::test]
    async fn login_page_links_providers() {
        let response = app()
            .oneshot(request("/login", None))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let html = String::from_utf8(bytes.to_vec()).expect("utf8");
        assert!(html.contains("href=\"/auth/redirect/github\""));
    }

    #[tokio::test]
    async fn protected_routes_redirect_to_login() {
        for path in ["/me", "/account"] {
            let response = app().oneshot(request(path, None)).await.expect("response");

            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
            assert_eq!(response.headers()[header::LOCATION], "/login");
        }
    }

    #[tokio::test]
    async fn protected_routes_serve_signed_in_user() {
        let credential = credential().await;

        let response = app()
            .oneshot(request("/account", Some(&credential)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["email"], "test@example.com");

        let response = app()
            .oneshot(request("/me", Some(&credential)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["subject"], "github_123321");
    }

    #[tokio::test]
    async fn tampered_credential_is_anonymous() {
        let credential = credential().await;
        let tampered = format!("{credential}x");

        let response = app()
            .oneshot(request("/me", Some(&tampered)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn logout_clears_credential() {
        let credential = credential().await;
        let response = app()
            .oneshot(request("/auth/logout", Some(&credential)))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/login");
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .expect("set-cookie");
        assert!(cookie.starts_with("jwt=;"));
    }

    #[tokio::test]
    async fn redirect_to_github() {
        let response = app()
            .oneshot(request("/auth/redirect/github", None))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let location = response.headers()[header::LOCATION]
            .to_str()
            .expect("location");
        assert!(location.starts_with("https://github.com/login/oauth/authorize"));
        assert!(location.contains("auth%2Fcallback%2Fgithub"));
    }

    #[tokio::test]
    async fn unconfigured_provider_is_bad_request() {
        let response = app()
            .oneshot(request("/auth/redirect/google", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn auth_metadata_passes_through() {
        let response = app()
            .oneshot(request("/auth/metadata", None))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["routes"]["route_prefix"], "/auth");
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let response = app()
            .oneshot(request("/nope", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_session_key_fails_startup() {
        let mut config = config();
        config.session = JwtStrategyConfig::new("zz", "gatehouse-test");
        assert!(build_dispatcher(&config).is_err());
    }
}
