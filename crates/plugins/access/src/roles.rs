//! Role definitions: custom role CRUD and read-only system roles.

use chrono::Utc;
use gym_access_core::{AccessError, AccessResult, StorageAdapter};
use std::collections::{BTreeSet, HashSet};

use crate::catalog::Catalog;
use crate::storage::AccessStorageExt;
use crate::types::{
    CreateRoleRequest, DbRole, DeletedRole, RoleWithCounts, RoleWithPermissions, UpdateRoleRequest,
};
use crate::AccessControl;

impl AccessControl {
    /// Creates a custom role with an initial permission set.
    pub async fn create_role(&self, req: CreateRoleRequest) -> AccessResult<RoleWithPermissions> {
        let name = validate_name(&req.name)?;
        if self.store.get_role_by_name(&name).await?.is_some() {
            return Err(AccessError::validation(format!("Role '{}' already exists", name)));
        }
        let permissions = validate_permissions(&req.permissions)?;

        let mut role = DbRole::new(uuid::Uuid::new_v4().to_string(), &name, req.scope);
        if let Some(display_name) = req.display_name.filter(|d| !d.trim().is_empty()) {
            role.display_name = display_name;
        }
        role.description = req.description;
        role.color = req.color;

        let created = self
            .store
            .create_role(&role, &permissions)
            .await
            .map_err(name_conflict)?;
        tracing::info!(role_id = %created.id, name = %created.name, "Created role");

        Ok(RoleWithPermissions {
            role: created,
            permissions,
        })
    }

    /// Gets a role with its permission ids.
    pub async fn get_role(&self, role_id: &str) -> AccessResult<RoleWithPermissions> {
        let role = self.require_role(role_id).await?;
        let permissions = self.store.get_role_permissions(&role.id).await?;
        Ok(RoleWithPermissions { role, permissions })
    }

    /// Lists every role with its permission ids.
    pub async fn list_roles(&self) -> AccessResult<Vec<RoleWithPermissions>> {
        let mut out = Vec::new();
        for role in self.store.list_roles().await? {
            let permissions = self.store.get_role_permissions(&role.id).await?;
            out.push(RoleWithPermissions { role, permissions });
        }
        Ok(out)
    }

    /// Updates a custom role's metadata.
    pub async fn update_role(&self, role_id: &str, patch: UpdateRoleRequest) -> AccessResult<DbRole> {
        let mut role = self.require_role(role_id).await?;
        if role.is_system {
            return Err(AccessError::forbidden("Cannot update system roles"));
        }

        if let Some(name) = patch.name {
            let name = validate_name(&name)?;
            if let Some(other) = self.store.get_role_by_name(&name).await? {
                if other.id != role.id {
                    return Err(AccessError::validation(format!("Role '{}' already exists", name)));
                }
            }
            role.name = name;
        }
        if let Some(display_name) = patch.display_name {
            role.display_name = display_name;
        }
        if let Some(desc) = patch.description {
            role.description = Some(desc);
        }
        if let Some(color) = patch.color {
            role.color = Some(color);
        }
        if let Some(scope) = patch.scope {
            role.scope = scope;
        }
        role.updated_at = Utc::now();

        self.store.update_role(&role).await.map_err(name_conflict)
    }

    /// Replaces a custom role's permission set. Omitted permissions are revoked.
    ///
    /// Validation happens before the write, so a rejected call leaves the
    /// prior set in place.
    pub async fn update_role_permissions(
        &self,
        role_id: &str,
        permission_ids: &[String],
    ) -> AccessResult<RoleWithPermissions> {
        let role = self.require_role(role_id).await?;
        if role.is_system {
            return Err(AccessError::forbidden("Cannot change permissions of system roles"));
        }
        let permissions = validate_permissions(permission_ids)?;

        self.store.replace_role_permissions(&role.id, &permissions).await?;
        let role = self.require_role(&role.id).await?;
        tracing::info!(role_id = %role.id, count = permissions.len(), "Replaced role permissions");

        Ok(RoleWithPermissions { role, permissions })
    }

    /// Deletes a custom role with its permission links and assignments.
    ///
    /// Users who held no other explicit assignment are reported back; they
    /// are not reassigned.
    pub async fn delete_role(&self, role_id: &str) -> AccessResult<DeletedRole> {
        let role = self.require_role(role_id).await?;
        if role.is_system {
            return Err(AccessError::forbidden("Cannot delete system roles"));
        }

        let removed = self.store.delete_role(&role.id).await?;

        let affected: BTreeSet<String> = removed.into_iter().map(|a| a.user_id).collect();
        let mut orphaned_users = Vec::new();
        for user_id in affected {
            if self.store.list_user_assignments(&user_id).await?.is_empty() {
                orphaned_users.push(user_id);
            }
        }

        tracing::info!(role_id = %role.id, name = %role.name, "Deleted role");
        if !orphaned_users.is_empty() {
            tracing::warn!(
                role_id = %role.id,
                users = ?orphaned_users,
                "Role deletion left users without any assigned role"
            );
        }

        Ok(DeletedRole { role, orphaned_users })
    }

    /// Lists roles with the number of users holding each and its permission count.
    ///
    /// A user holds a role through an assignment or, for system roles,
    /// through a primary role of the same name.
    pub async fn get_roles_with_usage_counts(&self) -> AccessResult<Vec<RoleWithCounts>> {
        let users = self.store.list_users().await?;
        let mut out = Vec::new();

        for role in self.store.list_roles().await? {
            let mut holders: HashSet<String> = self
                .store
                .list_role_assignments(&role.id)
                .await?
                .into_iter()
                .map(|a| a.user_id)
                .collect();
            if role.is_system {
                holders.extend(
                    users
                        .iter()
                        .filter(|u| role.has_name(u.role.as_str()))
                        .map(|u| u.id.clone()),
                );
            }
            let permission_count = self.store.get_role_permissions(&role.id).await?.len();

            out.push(RoleWithCounts {
                role,
                user_count: holders.len(),
                permission_count,
            });
        }

        Ok(out)
    }
}

fn validate_name(name: &str) -> AccessResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AccessError::validation("Role name is required"));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(AccessError::validation(format!(
            "Role name '{}' must not contain whitespace",
            name
        )));
    }
    Ok(name.to_string())
}

/// A store-level name clash reads the same as the up-front check. The two
/// can disagree when another writer takes the name in between.
fn name_conflict(err: AccessError) -> AccessError {
    match err {
        AccessError::DuplicateEntry { ref entity, ref field, ref value } if entity == "role" && field == "name" => {
            AccessError::validation(format!("Role '{}' already exists", value))
        }
        other => other,
    }
}

/// Checks every id against the catalog and returns the deduplicated, sorted set.
fn validate_permissions(ids: &[String]) -> AccessResult<Vec<String>> {
    let unknown = Catalog::unknown(ids.iter().map(String::as_str));
    if !unknown.is_empty() {
        return Err(AccessError::validation(format!(
            "Unknown permissions: {}",
            unknown.join(", ")
        )));
    }
    let set: BTreeSet<&String> = ids.iter().collect();
    Ok(set.into_iter().cloned().collect())
}
