//! User-role assignments and per-user permission overrides.

use gym_access_core::{AccessError, AccessResult, StorageAdapter};

use crate::catalog::Catalog;
use crate::storage::AccessStorageExt;
use crate::types::{AccessUserExt, OverrideEffect, PermissionOverrides, RoleAssignment};
use crate::AccessControl;

impl AccessControl {
    /// Assigns a role to a user, optionally at one branch.
    ///
    /// A branch-bound role assigned without a branch is stored at the
    /// user's own branch. The branch must belong to the user's gym.
    /// Assigning the same (user, role, branch) twice returns the existing row.
    pub async fn assign_role(
        &self,
        user_id: &str,
        role_id: &str,
        branch_id: Option<String>,
    ) -> AccessResult<RoleAssignment> {
        let user = self.require_user(user_id).await?;
        let role = self.require_role(role_id).await?;

        let branch_id = if role.scope.is_branch_bound() {
            let Some(branch_id) = branch_id.or_else(|| user.branch_id.clone()) else {
                return Err(AccessError::validation(format!(
                    "Role '{}' is {}-scoped; a branch is required for user '{}'",
                    role.name, role.scope, user.id
                )));
            };
            Some(branch_id)
        } else {
            branch_id
        };
        if let Some(branch_id) = &branch_id {
            self.claim_branch(&user, branch_id).await?;
        }

        let assignment = RoleAssignment::new(&user.id, &role.id, branch_id);
        if self.store.insert_assignment(&assignment).await? {
            tracing::info!(
                user_id = %user.id,
                role = %role.name,
                branch_id = ?assignment.branch_id,
                "Assigned role"
            );
            return Ok(assignment);
        }

        let existing = self
            .store
            .list_user_assignments(&user.id)
            .await?
            .into_iter()
            .find(|a| a.same_binding(&assignment))
            .unwrap_or(assignment);
        Ok(existing)
    }

    /// Revokes every assignment of the role to the user, at any branch.
    pub async fn revoke_role(&self, user_id: &str, role_id: &str) -> AccessResult<usize> {
        self.require_user(user_id).await?;
        self.require_role(role_id).await?;

        let removed = self.store.delete_assignments(user_id, role_id).await?;
        if removed == 0 {
            return Err(AccessError::not_found(
                "role_assignment",
                "user_id/role_id",
                format!("{}/{}", user_id, role_id),
            ));
        }

        tracing::info!(user_id = %user_id, role_id = %role_id, removed, "Revoked role");
        Ok(removed)
    }

    /// Snapshot of the user's assignments in creation order.
    pub async fn list_user_roles(&self, user_id: &str) -> AccessResult<Vec<RoleAssignment>> {
        self.require_user(user_id).await?;
        self.store.list_user_assignments(user_id).await
    }

    /// Grants a permission to one user regardless of their roles.
    pub async fn allow_permission(&self, user_id: &str, permission: &str) -> AccessResult<PermissionOverrides> {
        self.set_permission_override(user_id, permission, OverrideEffect::Allow)
            .await
    }

    /// Withholds a permission from one user, whatever their roles grant.
    pub async fn deny_permission(&self, user_id: &str, permission: &str) -> AccessResult<PermissionOverrides> {
        self.set_permission_override(user_id, permission, OverrideEffect::Deny)
            .await
    }

    /// Records an allow or deny override for a user.
    pub async fn set_permission_override(
        &self,
        user_id: &str,
        permission: &str,
        effect: OverrideEffect,
    ) -> AccessResult<PermissionOverrides> {
        if !Catalog::contains(permission) {
            return Err(AccessError::validation(format!("Unknown permission '{}'", permission)));
        }
        let mut user = self.require_user(user_id).await?;

        let mut overrides = user.permission_overrides();
        overrides.set(permission, effect);
        user.set_permission_overrides(&overrides);
        self.store.update_user(&user).await?;

        tracing::info!(user_id = %user_id, permission, effect = ?effect, "Set permission override");
        Ok(overrides)
    }

    /// Removes any override the user has for a permission.
    pub async fn clear_permission_override(
        &self,
        user_id: &str,
        permission: &str,
    ) -> AccessResult<PermissionOverrides> {
        let mut user = self.require_user(user_id).await?;

        let mut overrides = user.permission_overrides();
        if !overrides.clear(permission) {
            return Err(AccessError::not_found(
                "permission_override",
                "user_id/permission",
                format!("{}/{}", user_id, permission),
            ));
        }
        user.set_permission_overrides(&overrides);
        self.store.update_user(&user).await?;

        tracing::info!(user_id = %user_id, permission, "Cleared permission override");
        Ok(overrides)
    }
}
