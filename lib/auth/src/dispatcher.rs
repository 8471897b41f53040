//! Authentication dispatch.
//!
//! Every request gets a [`SessionAccessor`] in its extensions. Requests under
//! the auth root are then classified, in this order:
//! - `root + logout_prefix`: destroy the session, 302 to the logout route
//! - `root + callback_prefix + /<provider>`: verify, store the session,
//!   run the login hook, 302 to the post-login route
//! - `root + redirect_prefix + /<provider>`: hand off to the provider's
//!   authorization redirect
//!
//! Anything else, including other paths under the auth root, goes to `next`.

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use gatehouse_core::Profile;
use std::sync::Arc;

use crate::accessor::{AuthMetadata, SessionAccessor};
use crate::config::RouteConfig;
use crate::error::{AuthError, ConfigError};
use crate::event::AuthEvent;
use crate::provider::{AuthProvider, ProviderRegistry};
use crate::strategy::SessionStrategy;

/// Error type login hooks may fail with.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Runs after a session has been stored for a newly signed-in user.
#[async_trait]
pub trait LoginHook: Send + Sync {
    async fn on_login(&self, event: &AuthEvent, profile: &Profile) -> Result<(), HookError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Logout,
    Callback(Option<String>),
    Redirect(Option<String>),
}

/// Builder for [`AuthDispatcher`].
pub struct AuthDispatcherBuilder {
    routes: RouteConfig,
    providers: Vec<Arc<dyn AuthProvider>>,
    strategy: Arc<dyn SessionStrategy>,
    hook: Option<Arc<dyn LoginHook>>,
    public_origin: Option<String>,
}

impl AuthDispatcherBuilder {
    #[must_use]
    pub fn routes(mut self, routes: RouteConfig) -> Self {
        self.routes = routes;
        self
    }

    /// Registers a provider. Registration order is the order reported in
    /// [`AuthMetadata`].
    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn AuthProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    #[must_use]
    pub fn login_hook(mut self, hook: Arc<dyn LoginHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Fixes the origin used to build callback URIs instead of deriving it
    /// from each request.
    #[must_use]
    pub fn public_origin(mut self, origin: impl Into<String>) -> Self {
        self.public_origin = Some(origin.into());
        self
    }

    /// Validates the configuration and builds the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the routes are invalid or two providers share a name.
    pub fn build(self) -> Result<AuthDispatcher, ConfigError> {
        self.routes.validate()?;
        let providers = ProviderRegistry::new(self.providers)?;
        let metadata = Arc::new(AuthMetadata::new(&self.routes, &providers));

        tracing::debug!(
            root = %self.routes.root(),
            providers = ?providers,
            "auth dispatcher configured"
        );

        Ok(AuthDispatcher {
            logout_path: self.routes.logout_path(),
            callback_root: self.routes.callback_root(),
            redirect_root: self.routes.redirect_root(),
            routes: self.routes,
            providers,
            strategy: self.strategy,
            hook: self.hook,
            public_origin: self.public_origin,
            metadata,
        })
    }
}

/// Routes authentication requests and attaches session access to every request.
///
/// Configured once at startup and shared read-only across requests.
pub struct AuthDispatcher {
    routes: RouteConfig,
    providers: ProviderRegistry,
    strategy: Arc<dyn SessionStrategy>,
    hook: Option<Arc<dyn LoginHook>>,
    public_origin: Option<String>,
    metadata: Arc<AuthMetadata>,
    logout_path: String,
    callback_root: String,
    redirect_root: String,
}

impl AuthDispatcher {
    /// Starts building a dispatcher around a session strategy.
    #[must_use]
    pub fn builder(strategy: Arc<dyn SessionStrategy>) -> AuthDispatcherBuilder {
        AuthDispatcherBuilder {
            routes: RouteConfig::default(),
            providers: Vec::new(),
            strategy,
            hook: None,
            public_origin: None,
        }
    }

    #[must_use]
    pub fn routes(&self) -> &RouteConfig {
        &self.routes
    }

    #[must_use]
    pub fn metadata(&self) -> &AuthMetadata {
        &self.metadata
    }

    /// Handles one request, calling `next` for pass-through.
    pub async fn handle(&self, mut request: Request, next: Next) -> Response {
        let accessor = SessionAccessor::new(
            self.strategy.clone(),
            CookieJar::from_headers(request.headers()),
            self.metadata.clone(),
        );
        request.extensions_mut().insert(accessor);

        let Some(route) = self.classify(request.uri().path()) else {
            return next.run(request).await;
        };

        let mut event = AuthEvent::from_request(
            request.uri(),
            request.headers(),
            self.public_origin.as_deref(),
        );
        tracing::debug!(path = %event.path(), route = ?route, "handling auth request");

        let result = match route {
            Route::Logout => {
                self.strategy.destroy_session(&mut event).await;
                Ok(found(self.routes.logout_redirect()))
            }
            Route::Callback(name) => self.callback(&mut event, name.as_deref()).await,
            Route::Redirect(name) => self.redirect(&mut event, name.as_deref()).await,
        };

        // Cookie changes apply whether or not the flow succeeded, so a
        // consumed CSRF token is cleared on failure too.
        (event.into_cookies(), result).into_response()
    }

    /// Returns `None` for pass-through requests.
    fn classify(&self, path: &str) -> Option<Route> {
        if !path.starts_with(self.routes.root()) {
            return None;
        }
        if path.starts_with(&self.logout_path) {
            return Some(Route::Logout);
        }
        if let Some(rest) = path.strip_prefix(&self.callback_root) {
            return Some(Route::Callback(provider_segment(rest)));
        }
        if let Some(rest) = path.strip_prefix(&self.redirect_root) {
            return Some(Route::Redirect(provider_segment(rest)));
        }
        None
    }

    fn provider(&self, name: Option<&str>) -> Result<&Arc<dyn AuthProvider>, AuthError> {
        name.and_then(|name| self.providers.get(name))
            .ok_or_else(|| AuthError::UnknownProvider {
                name: name.map(str::to_string),
            })
    }

    /// The URI a provider redirects back to. Must match byte-for-byte between
    /// the redirect and the code exchange.
    fn callback_uri(&self, event: &AuthEvent, provider: &str) -> String {
        format!("{}{}", event.origin(), self.routes.callback_path(provider))
    }

    async fn callback(
        &self,
        event: &mut AuthEvent,
        name: Option<&str>,
    ) -> Result<Response, AuthError> {
        let provider = self.provider(name)?;
        let callback_uri = self.callback_uri(event, provider.name());

        let profile = provider.verify(event, &callback_uri).await?;
        self.strategy.store(event, &profile).await?;

        if let Some(hook) = &self.hook {
            if let Err(e) = hook.on_login(event, &profile).await {
                // Fail closed: the response replaces the stored credential with a deletion.
                self.strategy.destroy_session(event).await;
                return Err(AuthError::Hook {
                    reason: e.to_string(),
                });
            }
        }

        tracing::info!(
            provider = %profile.provider(),
            subject = %profile.subject(),
            "user signed in"
        );
        Ok(found(self.routes.login_redirect()))
    }

    async fn redirect(
        &self,
        event: &mut AuthEvent,
        name: Option<&str>,
    ) -> Result<Response, AuthError> {
        let provider = self.provider(name)?;
        let oauth = provider
            .oauth()
            .ok_or_else(|| AuthError::RedirectUnsupported {
                provider: provider.name().to_string(),
            })?;
        let callback_uri = self.callback_uri(event, provider.name());

        Ok(oauth
            .redirect_to_provider(event, &callback_uri)
            .await?
            .into_response())
    }
}

impl std::fmt::Debug for AuthDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthDispatcher")
            .field("routes", &self.routes)
            .field("providers", &self.providers)
            .field("public_origin", &self.public_origin)
            .field("hook", &self.hook.is_some())
            .finish_non_exhaustive()
    }
}

/// Provider name following a matched sub-prefix: `/github/...` yields `github`.
fn provider_segment(rest: &str) -> Option<String> {
    rest.strip_prefix('/')
        .and_then(|rest| rest.split('/').next())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// 302 Found to `location`.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Axum middleware entry point.
///
/// ```ignore
/// let app = Router::new()
///     .route("/", get(index))
///     .fallback(not_found)
///     .layer(axum::middleware::from_fn_with_state(dispatcher, auth_middleware));
/// ```
pub async fn auth_middleware(
    State(dispatcher): State<Arc<AuthDispatcher>>,
    request: Request,
    next: Next,
) -> Response {
    dispatcher.handle(request, next).await
}
