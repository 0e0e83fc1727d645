//! Tenant boundaries: which gym owns a branch and whom an actor may manage.

use gym_access_core::{AccessError, AccessResult, Branch, PrimaryRole, StorageAdapter, User};

use crate::engine::Principal;
use crate::types::DbRole;
use crate::AccessControl;

impl AccessControl {
    /// Records a branch under its gym.
    ///
    /// Registering a known branch again under the same gym returns the
    /// stored row. A branch owned by another gym is rejected.
    pub async fn register_branch(&self, branch: &Branch) -> AccessResult<Branch> {
        if branch.id.trim().is_empty() || branch.gym_id.trim().is_empty() {
            return Err(AccessError::validation("Branch id and gym id are required"));
        }

        if let Some(existing) = self.store.get_branch(&branch.id).await? {
            return owned_by(existing, &branch.gym_id);
        }

        match self.store.create_branch(branch).await {
            Ok(created) => {
                tracing::info!(branch_id = %created.id, gym_id = %created.gym_id, "Registered branch");
                Ok(created)
            }
            Err(AccessError::DuplicateEntry { .. }) => {
                // Another writer registered the id first.
                let existing = self
                    .store
                    .get_branch(&branch.id)
                    .await?
                    .ok_or_else(|| AccessError::not_found("branch", "id", &branch.id))?;
                owned_by(existing, &branch.gym_id)
            }
            Err(err) => Err(err),
        }
    }

    /// Lists the branches of one gym.
    pub async fn list_branches(&self, gym_id: &str) -> AccessResult<Vec<Branch>> {
        self.store.list_branches(gym_id).await
    }

    /// Loads a user the actor is allowed to manage.
    ///
    /// Users of another gym, and platform users without one, are off limits
    /// to everyone but platform operators.
    pub async fn authorize_target(&self, actor: &Principal, user_id: &str) -> AccessResult<User> {
        let user = self.require_user(user_id).await?;
        if !actor.same_tenant(user.gym_id.as_deref()) {
            tracing::warn!(
                actor = %actor.user_id,
                target = %user.id,
                "Rejected cross-tenant user management"
            );
            return Err(AccessError::forbidden(format!(
                "User '{}' belongs to another gym",
                user.id
            )));
        }
        Ok(user)
    }

    /// Checks that the actor may hand out a role.
    ///
    /// Roles that stand for a platform primary role can only be granted by
    /// platform operators.
    pub async fn authorize_role_grant(&self, actor: &Principal, role_id: &str) -> AccessResult<DbRole> {
        let role = self.require_role(role_id).await?;
        if is_platform_role(&role) && !actor.is_platform() {
            tracing::warn!(actor = %actor.user_id, role = %role.name, "Rejected platform role grant");
            return Err(AccessError::forbidden(format!(
                "Only platform operators may grant role '{}'",
                role.name
            )));
        }
        Ok(role)
    }

    /// Makes sure `branch_id` belongs to the user's gym, registering it
    /// there if no gym owns it yet. Platform users are not checked.
    pub(crate) async fn claim_branch(&self, user: &User, branch_id: &str) -> AccessResult<()> {
        if let Some(gym_id) = &user.gym_id {
            self.register_branch(&Branch::new(branch_id, gym_id)).await?;
        }
        Ok(())
    }
}

fn owned_by(branch: Branch, gym_id: &str) -> AccessResult<Branch> {
    if branch.gym_id == gym_id {
        Ok(branch)
    } else {
        Err(AccessError::forbidden(format!(
            "Branch '{}' belongs to another gym",
            branch.id
        )))
    }
}

fn is_platform_role(role: &DbRole) -> bool {
    role.is_system
        && PrimaryRole::all()
            .iter()
            .any(|p| p.is_platform() && role.has_name(p.as_str()))
}
