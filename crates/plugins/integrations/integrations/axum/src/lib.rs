//! # Gym Access Axum Integration
//!
//! This crate provides Axum integration for gym access control, including:
//! - Principal resolution from an upstream identity header
//! - Permission guards for routes
//! - Principal extractors
//! - REST routes for roles, assignments and overrides
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use axum::{Router, routing::get};
//! use gym_access_axum::{CurrentPrincipal, GuardLayer, PrincipalLayer};
//!
//! async fn members(principal: CurrentPrincipal) -> String {
//!     format!("Hello, {}!", principal.user_id)
//! }
//!
//! let app = Router::new()
//!     .route("/members", get(members).route_layer(GuardLayer::permission("members.view")))
//!     .nest("/api/access", access_routes(access.clone()))
//!     .layer(PrincipalLayer::new(access));
//! ```

mod extractor;
mod guard;
mod layer;
mod routes;

pub use extractor::{CurrentPrincipal, OptionalPrincipal, PrincipalRejection};
pub use guard::{GuardLayer, GuardMiddleware};
pub use layer::{
    PrincipalLayer, PrincipalLayerConfig, PrincipalMiddleware, RequestBranch, DEFAULT_BRANCH_HEADER,
    DEFAULT_IDENTITY_HEADER,
};
pub use routes::access_routes;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gym_access_core::AccessError;

/// Wrapper for AccessError that implements IntoResponse.
///
/// The body is `{ "success": false, "message": ... }`. Server-side faults
/// are reported with a generic message and logged instead.
#[derive(Debug)]
pub struct AccessErrorResponse(pub AccessError);

impl IntoResponse for AccessErrorResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = if self.0.is_user_error() {
            self.0.to_string()
        } else {
            tracing::error!(error = %self.0, "Access request failed");
            "Internal server error".to_string()
        };

        let body = serde_json::json!({
            "success": false,
            "message": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<AccessError> for AccessErrorResponse {
    fn from(err: AccessError) -> Self {
        AccessErrorResponse(err)
    }
}
