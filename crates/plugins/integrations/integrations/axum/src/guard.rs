//! Permission guard layer for Axum.
//!
//! Runs after [`PrincipalLayer`](crate::PrincipalLayer) and rejects the
//! request unless the caller's principal satisfies a [`Requirement`].

use axum::body::Body;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use gym_access_core::AccessError;
use gym_access_rbac::{Principal, Requirement};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use crate::layer::RequestBranch;
use crate::AccessErrorResponse;

/// Layer that enforces a requirement on every request.
#[derive(Debug, Clone)]
pub struct GuardLayer {
    requirement: Arc<Requirement>,
}

impl GuardLayer {
    pub fn new(requirement: Requirement) -> Self {
        Self {
            requirement: Arc::new(requirement),
        }
    }

    /// Requires a single permission.
    pub fn permission(permission: impl Into<String>) -> Self {
        Self::new(Requirement::permission(permission))
    }

    /// Requires at least one of the permissions.
    pub fn any(permissions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(Requirement::any(permissions))
    }

    /// Requires every one of the permissions.
    pub fn all(permissions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(Requirement::all(permissions))
    }

    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }
}

impl<S> Layer<S> for GuardLayer {
    type Service = GuardMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GuardMiddleware {
            inner,
            requirement: self.requirement.clone(),
        }
    }
}

/// Middleware service that checks the requirement before calling the inner service.
#[derive(Debug, Clone)]
pub struct GuardMiddleware<S> {
    inner: S,
    requirement: Arc<Requirement>,
}

impl<S> Service<Request<Body>> for GuardMiddleware<S>
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

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        if let Err(err) = check(&req, &self.requirement) {
            let response = AccessErrorResponse(err).into_response();
            return Box::pin(async move { Ok(response) });
        }

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await })
    }
}

fn check(req: &Request<Body>, requirement: &Requirement) -> Result<(), AccessError> {
    let Some(principal) = req.extensions().get::<Principal>() else {
        return Err(AccessError::Unauthenticated);
    };
    let branch = req.extensions().get::<RequestBranch>().and_then(RequestBranch::as_deref);

    if requirement.is_satisfied_by(principal, branch) {
        return Ok(());
    }

    tracing::debug!(
        user_id = %principal.user_id,
        requirement = %requirement.describe(),
        branch = ?branch,
        "Access denied"
    );
    Err(AccessError::forbidden(format!("Missing {}", requirement.describe())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gym_access_core::{PrimaryRole, RoleScope};
    use gym_access_rbac::RoleGrant;

    fn trainer() -> Principal {
        Principal::new("t1", PrimaryRole::Trainer).branch("B1").grant(
            RoleGrant::new("trainer", "trainer", RoleScope::Branch)
                .permissions(["members.view", "trainer.schedule.view"]),
        )
    }

    fn request(principal: Option<Principal>, branch: Option<&str>) -> Request<Body> {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        if let Some(principal) = principal {
            req.extensions_mut().insert(principal);
        }
        req.extensions_mut().insert(RequestBranch(branch.map(str::to_string)));
        req
    }

    #[test]
    fn test_missing_principal_is_unauthenticated() {
        let err = check(&request(None, None), &Requirement::permission("members.view")).unwrap_err();
        assert!(matches!(err, AccessError::Unauthenticated));
    }

    #[test]
    fn test_granted_permission_passes() {
        let req = request(Some(trainer()), Some("B1"));
        assert!(check(&req, &Requirement::permission("members.view")).is_ok());
        assert!(check(&req, &Requirement::any(["finance.view", "trainer.schedule.view"])).is_ok());
    }

    #[test]
    fn test_branch_header_narrows_grants() {
        let req = request(Some(trainer()), Some("B2"));
        let err = check(&req, &Requirement::permission("members.view")).unwrap_err();
        assert!(matches!(err, AccessError::Forbidden { .. }));
    }

    #[test]
    fn test_denied_permission_is_forbidden() {
        let req = request(Some(trainer().deny("members.view")), None);
        let err = check(&req, &Requirement::permission("members.view")).unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert!(err.to_string().contains("members.view"));
    }
}
