//! Principal resolution when the backing store fails.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use gym_access_adapter_memory::MemoryAdapter;
use gym_access_axum::{access_routes, PrincipalLayer};
use gym_access_core::{AccessError, AccessResult, Branch, PrimaryRole, StorageAdapter, User};
use gym_access_rbac::{AccessConfig, AccessControl, AccessStorageExt, DbRole, RoleAssignment};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

/// Memory store whose user lookups can be switched to fail.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryAdapter,
    down: AtomicBool,
}

#[async_trait]
impl StorageAdapter for FlakyStore {
    async fn create_user(&self, user: &User) -> AccessResult<User> {
        self.inner.create_user(user).await
    }

    async fn get_user_by_id(&self, id: &str) -> AccessResult<Option<User>> {
        if self.down.load(Ordering::SeqCst) {
            return Err(AccessError::database("connection reset"));
        }
        self.inner.get_user_by_id(id).await
    }

    async fn list_users(&self) -> AccessResult<Vec<User>> {
        self.inner.list_users().await
    }

    async fn update_user(&self, user: &User) -> AccessResult<User> {
        self.inner.update_user(user).await
    }

    async fn delete_user(&self, id: &str) -> AccessResult<()> {
        self.inner.delete_user(id).await
    }

    async fn create_branch(&self, branch: &Branch) -> AccessResult<Branch> {
        self.inner.create_branch(branch).await
    }

    async fn get_branch(&self, id: &str) -> AccessResult<Option<Branch>> {
        self.inner.get_branch(id).await
    }

    async fn list_branches(&self, gym_id: &str) -> AccessResult<Vec<Branch>> {
        self.inner.list_branches(gym_id).await
    }
}

#[async_trait]
impl AccessStorageExt for FlakyStore {
    async fn create_role(&self, role: &DbRole, permissions: &[String]) -> AccessResult<DbRole> {
        self.inner.create_role(role, permissions).await
    }

    async fn get_role(&self, id: &str) -> AccessResult<Option<DbRole>> {
        self.inner.get_role(id).await
    }

    async fn get_role_by_name(&self, name: &str) -> AccessResult<Option<DbRole>> {
        self.inner.get_role_by_name(name).await
    }

    async fn list_roles(&self) -> AccessResult<Vec<DbRole>> {
        self.inner.list_roles().await
    }

    async fn update_role(&self, role: &DbRole) -> AccessResult<DbRole> {
        self.inner.update_role(role).await
    }

    async fn update_role_with_permissions(&self, role: &DbRole, permissions: &[String]) -> AccessResult<DbRole> {
        self.inner.update_role_with_permissions(role, permissions).await
    }

    async fn delete_role(&self, id: &str) -> AccessResult<Vec<RoleAssignment>> {
        self.inner.delete_role(id).await
    }

    async fn get_role_permissions(&self, role_id: &str) -> AccessResult<Vec<String>> {
        self.inner.get_role_permissions(role_id).await
    }

    async fn replace_role_permissions(&self, role_id: &str, permissions: &[String]) -> AccessResult<()> {
        self.inner.replace_role_permissions(role_id, permissions).await
    }

    async fn insert_assignment(&self, assignment: &RoleAssignment) -> AccessResult<bool> {
        self.inner.insert_assignment(assignment).await
    }

    async fn delete_assignments(&self, user_id: &str, role_id: &str) -> AccessResult<usize> {
        self.inner.delete_assignments(user_id, role_id).await
    }

    async fn list_user_assignments(&self, user_id: &str) -> AccessResult<Vec<RoleAssignment>> {
        self.inner.list_user_assignments(user_id).await
    }

    async fn list_role_assignments(&self, role_id: &str) -> AccessResult<Vec<RoleAssignment>> {
        self.inner.list_role_assignments(role_id).await
    }
}

async fn setup() -> (Router, Arc<FlakyStore>) {
    let store = Arc::new(FlakyStore::default());
    let access = AccessControl::new(AccessConfig::gym_defaults(), store.clone());
    access.initialize().await.unwrap();
    access
        .register_user(&User::new("a1", "owner@example.com", PrimaryRole::Admin).gym("g1"))
        .await
        .unwrap();

    let app = Router::new()
        .nest("/api/access", access_routes(access.clone()))
        .layer(PrincipalLayer::new(access));
    (app, store)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(uri)
        .header("x-user-id", "a1")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_store_failure_is_a_server_error() {
    let (app, store) = setup().await;

    let (status, _) = get(&app, "/api/access/me/permissions").await;
    assert_eq!(status, StatusCode::OK);

    store.down.store(true, Ordering::SeqCst);

    let (status, body) = get(&app, "/api/access/me/permissions").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Internal server error");

    let (status, _) = get(&app, "/api/access/roles").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
