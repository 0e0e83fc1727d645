//! REST routes for access control management.
//!
//! Read routes require `roles.view`, mutations require `roles.manage`. The
//! caller's own permission snapshot only needs an authenticated principal.
//! Routes that target a user only reach users of the caller's gym unless
//! the caller is a platform operator.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put, MethodRouter};
use axum::{Json, Router};
use gym_access_rbac::{
    AccessControl, AssignRoleRequest, Catalog, CreateRoleRequest, SetOverrideRequest,
    SetRolePermissionsRequest, UpdateRoleRequest,
};
use serde_json::{json, Value};

use crate::extractor::CurrentPrincipal;
use crate::guard::GuardLayer;
use crate::layer::RequestBranch;
use crate::AccessErrorResponse;

const VIEW_PERMISSION: &str = "roles.view";
const MANAGE_PERMISSION: &str = "roles.manage";

type ApiResult<T> = Result<T, AccessErrorResponse>;

/// Creates an Axum router with the access management routes.
///
/// The router expects [`PrincipalLayer`](crate::PrincipalLayer) to run
/// before it.
///
/// # Example
///
/// ```rust,ignore
/// let app = Router::new()
///     .nest("/api/access", access_routes(access.clone()))
///     .layer(PrincipalLayer::new(access));
/// ```
pub fn access_routes<S>(access: AccessControl) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        // Catalog
        .route("/permissions", viewer(get(list_permissions)))
        // Roles
        .route(
            "/roles",
            viewer(get(list_roles)).merge(manager(post(create_role))),
        )
        .route(
            "/roles/{id}",
            viewer(get(get_role)).merge(manager(put(update_role).delete(delete_role))),
        )
        .route("/roles/{id}/permissions", manager(put(set_role_permissions)))
        // Assignments
        .route(
            "/users/{id}/roles",
            viewer(get(list_user_roles)).merge(manager(post(assign_role))),
        )
        .route("/users/{id}/roles/{role_id}", manager(delete(revoke_role)))
        // Overrides
        .route(
            "/users/{id}/overrides/{permission}",
            manager(put(set_override).delete(clear_override)),
        )
        // Caller snapshot
        .route("/me/permissions", get(my_permissions))
        .with_state(access)
}

fn viewer(route: MethodRouter<AccessControl>) -> MethodRouter<AccessControl> {
    route.route_layer(GuardLayer::permission(VIEW_PERMISSION))
}

fn manager(route: MethodRouter<AccessControl>) -> MethodRouter<AccessControl> {
    route.route_layer(GuardLayer::permission(MANAGE_PERMISSION))
}

// ============================================================================
// Catalog
// ============================================================================

/// GET /permissions - The permission catalog, flat and grouped by module
async fn list_permissions() -> Json<Value> {
    let modules: Vec<Value> = Catalog::grouped()
        .into_iter()
        .map(|(module, permissions)| {
            json!({
                "module": module,
                "name": module.display_name(),
                "permissions": permissions,
            })
        })
        .collect();

    Json(json!({
        "permissions": Catalog::list_all(),
        "modules": modules,
    }))
}

// ============================================================================
// Roles
// ============================================================================

/// GET /roles - List roles with usage counts
async fn list_roles(State(access): State<AccessControl>) -> ApiResult<Json<Value>> {
    let roles = access.get_roles_with_usage_counts().await?;
    Ok(Json(json!({ "roles": roles })))
}

/// POST /roles - Create a custom role
async fn create_role(
    State(access): State<AccessControl>,
    Json(body): Json<CreateRoleRequest>,
) -> ApiResult<impl IntoResponse> {
    let created = access.create_role(body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /roles/{id} - Get a role with its permissions
async fn get_role(State(access): State<AccessControl>, Path(id): Path<String>) -> ApiResult<impl IntoResponse> {
    Ok(Json(access.get_role(&id).await?))
}

/// PUT /roles/{id} - Update a custom role's metadata
async fn update_role(
    State(access): State<AccessControl>,
    Path(id): Path<String>,
    Json(body): Json<UpdateRoleRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(access.update_role(&id, body).await?))
}

/// DELETE /roles/{id} - Delete a custom role and its assignments
async fn delete_role(State(access): State<AccessControl>, Path(id): Path<String>) -> ApiResult<impl IntoResponse> {
    Ok(Json(access.delete_role(&id).await?))
}

/// PUT /roles/{id}/permissions - Replace a custom role's permission set
async fn set_role_permissions(
    State(access): State<AccessControl>,
    Path(id): Path<String>,
    Json(body): Json<SetRolePermissionsRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(access.update_role_permissions(&id, &body.permissions).await?))
}

// ============================================================================
// Assignments
// ============================================================================

/// GET /users/{id}/roles - List a user's role assignments
async fn list_user_roles(
    State(access): State<AccessControl>,
    principal: CurrentPrincipal,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    access.authorize_target(&principal, &id).await?;
    let assignments = access.list_user_roles(&id).await?;
    Ok(Json(json!({ "assignments": assignments })))
}

/// POST /users/{id}/roles - Assign a role to a user
async fn assign_role(
    State(access): State<AccessControl>,
    principal: CurrentPrincipal,
    Path(id): Path<String>,
    Json(body): Json<AssignRoleRequest>,
) -> ApiResult<impl IntoResponse> {
    access.authorize_target(&principal, &id).await?;
    access.authorize_role_grant(&principal, &body.role_id).await?;
    let assignment = access.assign_role(&id, &body.role_id, body.branch_id).await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

/// DELETE /users/{id}/roles/{role_id} - Revoke a role from a user at every branch
async fn revoke_role(
    State(access): State<AccessControl>,
    principal: CurrentPrincipal,
    Path((id, role_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    access.authorize_target(&principal, &id).await?;
    let removed = access.revoke_role(&id, &role_id).await?;
    Ok(Json(json!({ "success": true, "removed": removed })))
}

// ============================================================================
// Overrides
// ============================================================================

/// PUT /users/{id}/overrides/{permission} - Allow or deny a permission for one user
async fn set_override(
    State(access): State<AccessControl>,
    principal: CurrentPrincipal,
    Path((id, permission)): Path<(String, String)>,
    Json(body): Json<SetOverrideRequest>,
) -> ApiResult<impl IntoResponse> {
    access.authorize_target(&principal, &id).await?;
    Ok(Json(access.set_permission_override(&id, &permission, body.effect).await?))
}

/// DELETE /users/{id}/overrides/{permission} - Remove a user's override
async fn clear_override(
    State(access): State<AccessControl>,
    principal: CurrentPrincipal,
    Path((id, permission)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    access.authorize_target(&principal, &id).await?;
    Ok(Json(access.clear_permission_override(&id, &permission).await?))
}

// ============================================================================
// Caller Snapshot
// ============================================================================

/// GET /me/permissions - The caller's effective permissions at the requested branch
async fn my_permissions(principal: CurrentPrincipal, branch: RequestBranch) -> Json<Value> {
    Json(json!({
        "user_id": principal.user_id,
        "primary_role": principal.primary_role,
        "branch_id": principal.branch_id,
        "is_global": principal.is_global(),
        "branches": principal.branches(),
        "permissions": principal.effective_permissions(branch.as_deref()),
    }))
}
