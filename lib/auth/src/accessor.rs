//! Per-request session access for downstream handlers.
//!
//! The dispatcher inserts a [`SessionAccessor`] into every request's
//! extensions before routing. Handlers read it directly, through the
//! [`RequireSession`] extractor, or behind the [`require_session`] middleware.

use axum::{
    extract::{FromRequestParts, Request},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use gatehouse_core::Session;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::config::RouteConfig;
use crate::provider::ProviderRegistry;
use crate::strategy::SessionStrategy;

/// Public description of the auth routes, safe to hand to a front end.
#[derive(Debug, Clone, Serialize)]
pub struct AuthMetadata {
    routes: RouteConfig,
    providers: Vec<ProviderLink>,
}

/// One registered provider and where its sign-in flow starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderLink {
    pub name: String,
    pub supports_redirect: bool,
    /// Path of the redirect flow; `None` for providers without one.
    pub redirect_path: Option<String>,
}

impl AuthMetadata {
    #[must_use]
    pub fn new(routes: &RouteConfig, providers: &ProviderRegistry) -> Self {
        let providers = providers
            .iter()
            .map(|provider| {
                let supports_redirect = provider.oauth().is_some();
                ProviderLink {
                    name: provider.name().to_string(),
                    supports_redirect,
                    redirect_path: supports_redirect.then(|| routes.redirect_path(provider.name())),
                }
            })
            .collect();

        Self {
            routes: routes.clone(),
            providers,
        }
    }

    #[must_use]
    pub fn routes(&self) -> &RouteConfig {
        &self.routes
    }

    #[must_use]
    pub fn providers(&self) -> &[ProviderLink] {
        &self.providers
    }

    /// Where to send the browser to sign in with `provider`.
    ///
    /// Returns `None` if the provider is unknown or has no redirect flow.
    #[must_use]
    pub fn login_url(&self, provider: &str) -> Option<&str> {
        self.providers
            .iter()
            .find(|link| link.name == provider)
            .and_then(|link| link.redirect_path.as_deref())
    }

    /// Where to send the browser to sign out.
    #[must_use]
    pub fn logout_url(&self) -> String {
        self.routes.logout_path()
    }
}

struct AccessorInner {
    strategy: Arc<dyn SessionStrategy>,
    cookies: CookieJar,
    metadata: Arc<AuthMetadata>,
    session: OnceCell<Option<Session>>,
}

/// Reads the current session for one request.
///
/// Cheap to clone; clones share the memoized session.
#[derive(Clone)]
pub struct SessionAccessor {
    inner: Arc<AccessorInner>,
}

impl SessionAccessor {
    #[must_use]
    pub fn new(
        strategy: Arc<dyn SessionStrategy>,
        cookies: CookieJar,
        metadata: Arc<AuthMetadata>,
    ) -> Self {
        Self {
            inner: Arc::new(AccessorInner {
                strategy,
                cookies,
                metadata,
                session: OnceCell::new(),
            }),
        }
    }

    /// Returns the session carried by the request, decoding it at most once.
    pub async fn session(&self) -> Option<Session> {
        self.inner
            .session
            .get_or_init(|| self.inner.strategy.get_session(&self.inner.cookies))
            .await
            .clone()
    }

    #[must_use]
    pub fn metadata(&self) -> &AuthMetadata {
        &self.inner.metadata
    }
}

impl std::fmt::Debug for SessionAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAccessor")
            .field("metadata", &self.inner.metadata)
            .field("session", &self.inner.session.get())
            .finish()
    }
}

impl<S> FromRequestParts<S> for SessionAccessor
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionAccessor>()
            .cloned()
            .ok_or(AuthRejection::MissingAccessor)
    }
}

/// Extractor for requiring a signed-in user.
///
/// Without a session, the request is redirected (303) to the login route.
#[derive(Debug, Clone)]
pub struct RequireSession(pub Session);

impl<S> FromRequestParts<S> for RequireSession
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let accessor = SessionAccessor::from_request_parts(parts, state).await?;
        match accessor.session().await {
            Some(session) => Ok(RequireSession(session)),
            None => Err(AuthRejection::NotAuthenticated {
                login_route: accessor.metadata().routes().login().to_string(),
            }),
        }
    }
}

/// Rejection type for the session extractors.
#[derive(Debug)]
pub enum AuthRejection {
    NotAuthenticated { login_route: String },
    /// The auth middleware is not installed in front of this handler.
    MissingAccessor,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::NotAuthenticated { login_route } => Redirect::to(&login_route).into_response(),
            Self::MissingAccessor => {
                tracing::error!("session accessor missing; is the auth middleware installed?");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

/// Middleware that only lets signed-in requests through.
///
/// ```ignore
/// let protected = Router::new()
///     .route("/settings", get(settings))
///     .route_layer(axum::middleware::from_fn(require_session));
/// ```
pub async fn require_session(request: Request, next: Next) -> Response {
    let Some(accessor) = request.extensions().get::<SessionAccessor>().cloned() else {
        return AuthRejection::MissingAccessor.into_response();
    };

    if accessor.session().await.is_none() {
        return AuthRejection::NotAuthenticated {
            login_route: accessor.metadata().routes().login().to_string(),
        }
        .into_response();
    }

    next.run(request).await
}
