//! # Gym Access Server
//!
//! Standalone access control server exposing role management and caller
//! permission snapshots over HTTP. Authentication happens upstream; the
//! server trusts the configured identity header.

mod config;

pub use config::{
    load_config, parse_config, AccessSettings, AppConfig, BootstrapUser, ConfigError, ServerConfig,
};

use axum::routing::get;
use axum::{Json, Router};
use gym_access_adapter_memory::MemoryAdapter;
use gym_access_axum::{access_routes, PrincipalLayer, PrincipalLayerConfig};
use gym_access_core::{AccessError, StorageAdapter};
use gym_access_rbac::{AccessConfig, AccessControl};
use serde_json::json;
use std::sync::Arc;

/// Server startup error.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The access control server.
pub struct AccessServer {
    /// Server configuration.
    pub config: AppConfig,
    access: AccessControl,
}

impl AccessServer {
    /// Creates a new server over an existing access control service.
    pub fn new(config: AppConfig, access: AccessControl) -> Self {
        Self { config, access }
    }

    /// Creates a server backed by the in-memory adapter and the standard gym roles.
    pub fn in_memory(config: AppConfig) -> Self {
        let access = AccessControl::new(AccessConfig::gym_defaults(), Arc::new(MemoryAdapter::new()));
        Self::new(config, access)
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    /// Seeds system roles when enabled, then registers configured users
    /// that do not exist yet.
    pub async fn initialize(&self) -> Result<(), ServerError> {
        if self.config.access.seed_system_roles {
            self.access.initialize().await?;
            tracing::info!(
                roles = self.access.config().system_roles.len(),
                "System roles ready"
            );
        }

        for configured in &self.config.users {
            if self.access.store().get_user_by_id(&configured.id).await?.is_some() {
                tracing::debug!(user_id = %configured.id, "Configured user already exists");
                continue;
            }
            self.access.register_user(&configured.to_user()).await?;
        }
        Ok(())
    }

    /// Builds the application router.
    pub fn router(&self) -> Router {
        let layer_config = PrincipalLayerConfig::new()
            .identity_header(&self.config.access.identity_header)
            .branch_header(&self.config.access.branch_header);

        Router::new()
            .route("/health", get(health))
            .nest(&self.config.access.base_path, access_routes(self.access.clone()))
            .layer(PrincipalLayer::with_config(self.access.clone(), layer_config))
    }

    /// Starts the server.
    pub async fn run(&self) -> Result<(), ServerError> {
        self.config.validate()?;
        self.initialize().await?;

        let addr = self.config.server.addr();
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!(
            addr = %addr,
            base_path = %self.config.access.base_path,
            identity_header = %self.config.access.identity_header,
            "Starting gym access server"
        );

        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use gym_access_core::{PrimaryRole, User};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health() {
        let server = AccessServer::in_memory(AppConfig::default());
        let response = server
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_configured_headers_and_base_path() {
        let config = parse_config(
            r#"
            [access]
            identity_header = "x-auth-user"
            base_path = "/rbac"
            "#,
        )
        .unwrap();
        let server = AccessServer::in_memory(config);
        server.initialize().await.unwrap();
        server
            .access()
            .register_user(&User::new("a1", "owner@example.com", PrimaryRole::Admin).gym("g1"))
            .await
            .unwrap();

        let request = Request::builder()
            .uri("/rbac/roles")
            .header("x-auth-user", "a1")
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let request = Request::builder()
            .uri("/rbac/roles")
            .header("x-user-id", "a1")
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_configured_user_can_manage_roles() {
        let config = parse_config(
            r#"
            [[users]]
            id = "owner"
            email = "owner@example.com"
            role = "admin"
            gym_id = "g1"
            "#,
        )
        .unwrap();
        let server = AccessServer::in_memory(config);
        server.initialize().await.unwrap();
        // Startup may run again against the same store.
        server.initialize().await.unwrap();

        let request = Request::builder()
            .uri("/api/access/roles")
            .header("x-user-id", "owner")
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let request = Request::builder()
            .uri("/api/access/roles")
            .header("x-user-id", "nobody")
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_seeding_can_be_disabled() {
        let config = parse_config("[access]\nseed_system_roles = false").unwrap();
        let server = AccessServer::in_memory(config);
        server.initialize().await.unwrap();
        assert!(server.access().list_roles().await.unwrap().is_empty());
    }
}
