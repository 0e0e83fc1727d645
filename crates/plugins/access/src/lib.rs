//! # Gym Access RBAC
//!
//! Role-based access control for a multi-branch gym platform. It provides:
//! - A static permission catalog grouped by module
//! - System roles seeded at deployment and mutable custom roles
//! - Branch-scoped role assignments and per-user allow/deny overrides
//! - A pure decision engine with deny-by-default and deny-wins semantics
//! - Requirements and gates shared by HTTP guards and UI adapters
//!
//! ## Usage
//!
//! ```rust,ignore
//! let access = AccessControl::new(AccessConfig::gym_defaults(), store);
//! access.initialize().await?;
//!
//! let principal = access.principal("user_123").await?;
//! if principal.can("members.edit", Some("downtown")) {
//!     // ...
//! }
//! ```

mod assignments;
pub mod catalog;
pub mod engine;
pub mod gate;
mod roles;
mod storage;
mod tenancy;
mod types;

pub use catalog::{Catalog, Permission, PermissionDef, PermissionModule};
pub use engine::{Decision, DenyReason, Principal, RoleGrant};
pub use gate::{gate, GateOutcome, Requirement};
pub use storage::{AccessStorageExt, AccessStore};
pub use types::*;

use gym_access_core::{AccessError, AccessResult, PrimaryRole, RoleScope, StorageAdapter, User};
use std::collections::BTreeSet;
use std::sync::Arc;

// ============================================================================
// System Role Templates
// ============================================================================

/// A role shipped with the deployment. Seeded as an immutable system role.
#[derive(Debug, Clone)]
pub struct SystemRole {
    /// Machine key; doubles as the role id.
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub scope: RoleScope,
    pub permissions: BTreeSet<String>,
}

impl SystemRole {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>, scope: RoleScope) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            description: None,
            color: None,
            scope,
            permissions: BTreeSet::new(),
        }
    }

    /// Adds a permission to this role.
    pub fn permission(mut self, perm: impl Into<String>) -> Self {
        self.permissions.insert(perm.into());
        self
    }

    /// Adds multiple permissions.
    pub fn permissions(mut self, perms: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for perm in perms {
            self.permissions.insert(perm.into());
        }
        self
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    fn to_db_role(&self) -> DbRole {
        let mut role = DbRole::new(&self.name, &self.name, self.scope)
            .display_name(&self.display_name)
            .system();
        role.description = self.description.clone();
        role.color = self.color.clone();
        role
    }
}

// ============================================================================
// Access Configuration
// ============================================================================

/// Access control configuration.
#[derive(Debug, Clone, Default)]
pub struct AccessConfig {
    /// Roles seeded by [`AccessControl::initialize`].
    pub system_roles: Vec<SystemRole>,
}

impl AccessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> AccessConfigBuilder {
        AccessConfigBuilder::new()
    }

    /// Gets a system role template by name.
    pub fn get_system_role(&self, name: &str) -> Option<&SystemRole> {
        self.system_roles.iter().find(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// The standard gym roles, one per primary role.
    pub fn gym_defaults() -> Self {
        Self::builder()
            .system_role(
                SystemRole::new(PrimaryRole::SuperAdmin.as_str(), "Super Admin", RoleScope::Global)
                    .description("Platform operator with every permission")
                    .color("#7c3aed")
                    .permissions(Catalog::all_ids()),
            )
            .system_role(
                SystemRole::new(PrimaryRole::Admin.as_str(), "Gym Admin", RoleScope::Global)
                    .description("Owner of a gym across all of its branches")
                    .color("#dc2626")
                    .permissions(Catalog::all_ids()),
            )
            .system_role(
                SystemRole::new(PrimaryRole::Manager.as_str(), "Branch Manager", RoleScope::Branch)
                    .description("Runs a single branch")
                    .color("#2563eb")
                    .permissions([
                        "members.view", "members.create", "members.edit", "members.delete", "members.export",
                        "memberships.view", "memberships.assign", "memberships.edit",
                        "finance.view", "finance.create", "finance.process", "finance.reports",
                        "classes.view", "classes.create", "classes.edit", "classes.delete", "classes.book",
                        "equipment.view", "equipment.create", "equipment.edit", "equipment.delete",
                        "equipment.maintenance",
                        "lockers.view", "lockers.assign", "lockers.release", "lockers.manage",
                        "staff.view", "staff.edit",
                        "attendance.view", "attendance.mark", "attendance.export",
                        "devices.view", "devices.sync",
                        "sms.view", "sms.send", "sms.templates",
                        "trainer.view", "trainer.assign", "trainer.schedule.view", "trainer.schedule.edit",
                        "branches.view",
                        "roles.view",
                        "reports.view", "reports.export",
                        "feedback.view", "feedback.respond",
                    ]),
            )
            .system_role(
                SystemRole::new(PrimaryRole::Staff.as_str(), "Front Desk", RoleScope::Branch)
                    .color("#0891b2")
                    .permissions([
                        "members.view", "members.create", "members.edit",
                        "memberships.view", "memberships.assign",
                        "finance.view", "finance.create", "finance.process",
                        "classes.view", "classes.book",
                        "lockers.view", "lockers.assign", "lockers.release",
                        "attendance.view", "attendance.mark",
                        "sms.view", "sms.send",
                        "feedback.view",
                    ]),
            )
            .system_role(
                SystemRole::new(PrimaryRole::Trainer.as_str(), "Trainer", RoleScope::Branch)
                    .color("#16a34a")
                    .permissions([
                        "members.view",
                        "classes.view",
                        "attendance.view", "attendance.mark",
                        "trainer.view", "trainer.schedule.view", "trainer.clients.view",
                        "trainer.workouts.create", "trainer.diets.create",
                    ]),
            )
            .system_role(
                SystemRole::new(PrimaryRole::Team.as_str(), "Team Member", RoleScope::Branch)
                    .color("#ca8a04")
                    .permissions([
                        "members.view",
                        "classes.view",
                        "attendance.view", "attendance.mark",
                        "lockers.view",
                        "feedback.view",
                    ]),
            )
            .system_role(
                SystemRole::new(PrimaryRole::Member.as_str(), "Member", RoleScope::SelfOnly)
                    .color("#64748b")
                    .permissions(["classes.view", "classes.book", "attendance.view", "trainer.view"]),
            )
            .build()
    }
}

/// Builder for access configuration.
pub struct AccessConfigBuilder {
    config: AccessConfig,
}

impl AccessConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AccessConfig::default(),
        }
    }

    /// Defines a system role, replacing any template with the same name.
    pub fn system_role(mut self, role: SystemRole) -> Self {
        self.config.system_roles.retain(|r| !r.name.eq_ignore_ascii_case(&role.name));
        self.config.system_roles.push(role);
        self
    }

    pub fn build(self) -> AccessConfig {
        self.config
    }
}

impl Default for AccessConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Access Control Service
// ============================================================================

/// Role management, assignments and principal resolution over one store.
///
/// Principals are rebuilt from storage on every call so role, assignment
/// and override changes apply without re-authentication.
#[derive(Clone)]
pub struct AccessControl {
    config: Arc<AccessConfig>,
    store: Arc<dyn AccessStore>,
}

impl AccessControl {
    pub fn new(config: AccessConfig, store: Arc<dyn AccessStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn AccessStore> {
        &self.store
    }

    /// Seeds the configured system roles.
    ///
    /// Existing system roles are rewritten to match their template. Fails if
    /// a custom role already uses a system role's name.
    pub async fn initialize(&self) -> AccessResult<()> {
        for template in &self.config.system_roles {
            let unknown = Catalog::unknown(template.permissions.iter().map(String::as_str));
            if !unknown.is_empty() {
                return Err(AccessError::config(format!(
                    "System role '{}' references unknown permissions: {}",
                    template.name,
                    unknown.join(", ")
                )));
            }

            let permissions: Vec<String> = template.permissions.iter().cloned().collect();

            match self.store.get_role_by_name(&template.name).await? {
                None => {
                    self.store.create_role(&template.to_db_role(), &permissions).await?;
                    tracing::info!(role = %template.name, "Seeded system role");
                }
                Some(existing) if existing.is_system => {
                    let mut role = template.to_db_role();
                    role.id = existing.id.clone();
                    role.created_at = existing.created_at;
                    self.store.update_role_with_permissions(&role, &permissions).await?;
                    tracing::debug!(role = %template.name, "Refreshed system role");
                }
                Some(existing) => {
                    return Err(AccessError::config(format!(
                        "Custom role '{}' ({}) conflicts with a system role name",
                        existing.name, existing.id
                    )));
                }
            }
        }

        Ok(())
    }

    /// Validates and stores a user profile.
    ///
    /// The user's branch is registered under their gym on first use.
    pub async fn register_user(&self, user: &User) -> AccessResult<User> {
        user.validate()?;
        if let Some(branch_id) = &user.branch_id {
            self.claim_branch(user, branch_id).await?;
        }
        let created = self.store.create_user(user).await?;
        tracing::info!(user_id = %created.id, role = %created.role, "Registered user");
        Ok(created)
    }

    /// Builds the principal snapshot for a user.
    pub async fn principal(&self, user_id: &str) -> AccessResult<Principal> {
        let user = self.require_user(user_id).await?;
        self.principal_for(&user).await
    }

    /// Builds the principal snapshot for an already-loaded user.
    pub async fn principal_for(&self, user: &User) -> AccessResult<Principal> {
        let mut grants = Vec::new();

        // The primary role maps onto the system role of the same name.
        if let Some(role) = self.store.get_role_by_name(user.role.as_str()).await? {
            if role.is_system {
                let permissions = self.store.get_role_permissions(&role.id).await?;
                grants.push(RoleGrant::new(&role.id, &role.name, role.scope).permissions(permissions));
            }
        }

        for assignment in self.store.list_user_assignments(&user.id).await? {
            // Skip rows whose role vanished between the two reads.
            let Some(role) = self.store.get_role(&assignment.role_id).await? else {
                continue;
            };
            let permissions = self.store.get_role_permissions(&role.id).await?;
            let mut grant = RoleGrant::new(&role.id, &role.name, role.scope).permissions(permissions);
            grant.branch_id = assignment.branch_id;
            grants.push(grant);
        }

        let tenant_branches: BTreeSet<String> = match &user.gym_id {
            Some(gym_id) => self
                .store
                .list_branches(gym_id)
                .await?
                .into_iter()
                .map(|b| b.id)
                .collect(),
            None => BTreeSet::new(),
        };

        let overrides = user.permission_overrides();

        Ok(Principal {
            user_id: user.id.clone(),
            primary_role: user.role,
            branch_id: user.branch_id.clone(),
            gym_id: user.gym_id.clone(),
            tenant_branches,
            grants,
            allow: overrides.allow.into_iter().collect(),
            deny: overrides.deny.into_iter().collect(),
        })
    }

    async fn require_user(&self, user_id: &str) -> AccessResult<User> {
        self.store
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| AccessError::not_found("user", "id", user_id))
    }

    async fn require_role(&self, role_id: &str) -> AccessResult<DbRole> {
        self.store
            .get_role(role_id)
            .await?
            .ok_or_else(|| AccessError::not_found("role", "id", role_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gym_defaults_cover_every_primary_role() {
        let config = AccessConfig::gym_defaults();
        for role in PrimaryRole::all() {
            let template = config
                .get_system_role(role.as_str())
                .unwrap_or_else(|| panic!("missing template for {}", role));
            assert_eq!(template.scope, role.scope());
        }
    }

    #[test]
    fn test_gym_defaults_only_use_catalog_permissions() {
        let config = AccessConfig::gym_defaults();
        for template in &config.system_roles {
            let unknown = Catalog::unknown(template.permissions.iter().map(String::as_str));
            assert!(unknown.is_empty(), "{} uses {:?}", template.name, unknown);
        }
    }

    #[test]
    fn test_builder_replaces_same_name() {
        let config = AccessConfig::builder()
            .system_role(SystemRole::new("coach", "Coach", RoleScope::Branch).permission("classes.view"))
            .system_role(SystemRole::new("Coach", "Head Coach", RoleScope::Branch))
            .build();
        assert_eq!(config.system_roles.len(), 1);
        assert_eq!(config.get_system_role("coach").unwrap().display_name, "Head Coach");
    }
}
