//! Principal extractors for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use gym_access_core::AccessError;
use gym_access_rbac::Principal;
use std::ops::Deref;

use crate::layer::RequestBranch;
use crate::AccessErrorResponse;

/// Extractor for the authenticated caller's principal.
///
/// This extractor will reject the request with 401 Unauthorized if the
/// principal layer did not resolve a principal.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(principal: CurrentPrincipal) -> String {
///     format!("Hello, {}!", principal.user_id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

impl Deref for CurrentPrincipal {
    type Target = Principal;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Error returned when no principal is attached to the request.
#[derive(Debug)]
pub struct PrincipalRejection;

impl IntoResponse for PrincipalRejection {
    fn into_response(self) -> Response {
        AccessErrorResponse(AccessError::Unauthenticated).into_response()
    }
}

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = PrincipalRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentPrincipal)
            .ok_or(PrincipalRejection)
    }
}

/// Extractor for an optional principal.
///
/// This extractor will return `None` if no principal was resolved,
/// instead of rejecting the request.
#[derive(Debug, Clone)]
pub struct OptionalPrincipal(pub Option<Principal>);

impl<S> FromRequestParts<S> for OptionalPrincipal
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalPrincipal(parts.extensions.get::<Principal>().cloned()))
    }
}

impl<S> FromRequestParts<S> for RequestBranch
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<RequestBranch>().cloned().unwrap_or_default())
    }
}
