//! Principal resolution middleware layer for Axum.
//!
//! Authentication happens upstream; this layer trusts the identity header it
//! is configured with and turns the user id into a [`Principal`] request
//! extension. Requests naming no user, or an unknown one, pass through
//! without a principal. A store failure while resolving ends the request
//! with a server error.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use gym_access_core::AccessError;
use gym_access_rbac::{AccessControl, Principal};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use crate::AccessErrorResponse;

/// Header carrying the authenticated user id by default.
pub const DEFAULT_IDENTITY_HEADER: &str = "x-user-id";

/// Header carrying the branch a request targets by default.
pub const DEFAULT_BRANCH_HEADER: &str = "x-branch-id";

/// Configuration for the principal layer.
#[derive(Debug, Clone)]
pub struct PrincipalLayerConfig {
    /// Header holding the authenticated user id.
    pub identity_header: String,
    /// Header holding the target branch.
    pub branch_header: String,
}

impl Default for PrincipalLayerConfig {
    fn default() -> Self {
        Self {
            identity_header: DEFAULT_IDENTITY_HEADER.to_string(),
            branch_header: DEFAULT_BRANCH_HEADER.to_string(),
        }
    }
}

impl PrincipalLayerConfig {
    /// Creates a new config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the identity header name.
    pub fn identity_header(mut self, header: impl Into<String>) -> Self {
        self.identity_header = header.into();
        self
    }

    /// Sets the branch header name.
    pub fn branch_header(mut self, header: impl Into<String>) -> Self {
        self.branch_header = header.into();
        self
    }
}

/// Branch targeted by the current request, taken from the branch header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestBranch(pub Option<String>);

impl RequestBranch {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// Layer that attaches the caller's principal to requests.
#[derive(Clone)]
pub struct PrincipalLayer {
    access: AccessControl,
    config: Arc<PrincipalLayerConfig>,
}

impl PrincipalLayer {
    /// Creates a new principal layer with the default headers.
    pub fn new(access: AccessControl) -> Self {
        Self::with_config(access, PrincipalLayerConfig::default())
    }

    /// Creates a new principal layer with custom configuration.
    pub fn with_config(access: AccessControl, config: PrincipalLayerConfig) -> Self {
        Self {
            access,
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for PrincipalLayer {
    type Service = PrincipalMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PrincipalMiddleware {
            inner,
            access: self.access.clone(),
            config: self.config.clone(),
        }
    }
}

/// Middleware service that resolves principals.
#[derive(Clone)]
pub struct PrincipalMiddleware<S> {
    inner: S,
    access: AccessControl,
    config: Arc<PrincipalLayerConfig>,
}

impl<S> Service<Request<Body>> for PrincipalMiddleware<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let access = self.access.clone();
        let config = self.config.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let branch = header_value(&req, &config.branch_header);
            req.extensions_mut().insert(RequestBranch(branch));

            if let Some(user_id) = header_value(&req, &config.identity_header) {
                match resolve(&access, &user_id).await {
                    Ok(Some(principal)) => {
                        req.extensions_mut().insert(principal);
                    }
                    Ok(None) => {}
                    Err(err) => return Ok(AccessErrorResponse(err).into_response()),
                }
            }

            inner.call(req).await
        })
    }
}

/// Unknown users resolve to no principal; any other failure is returned.
async fn resolve(access: &AccessControl, user_id: &str) -> Result<Option<Principal>, AccessError> {
    match access.principal(user_id).await {
        Ok(principal) => Ok(Some(principal)),
        Err(AccessError::NotFound { .. }) => {
            tracing::debug!(user_id, "Identity header names an unknown user");
            Ok(None)
        }
        Err(err) => {
            tracing::warn!(user_id, error = %err, "Failed to resolve principal");
            Err(err)
        }
    }
}

/// Reads a non-empty header value.
fn header_value(req: &Request<Body>, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
