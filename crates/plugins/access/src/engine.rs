//! The access decision engine.
//!
//! A [`Principal`] is a snapshot of everything a decision needs: the user's
//! profile, the roles they hold with each role's scope and permissions, and
//! their custom overrides. Decisions are pure functions of that snapshot and
//! the request, so they can be evaluated anywhere without I/O.

use gym_access_core::{PrimaryRole, RoleScope};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::catalog::Permission;

/// One role held by a principal, resolved with its permissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role_id: String,
    pub role_name: String,
    pub scope: RoleScope,
    /// Branch the role was assigned at. `None` falls back to the user's branch.
    pub branch_id: Option<String>,
    pub permissions: HashSet<String>,
}

impl RoleGrant {
    pub fn new(role_id: impl Into<String>, role_name: impl Into<String>, scope: RoleScope) -> Self {
        Self {
            role_id: role_id.into(),
            role_name: role_name.into(),
            scope,
            branch_id: None,
            permissions: HashSet::new(),
        }
    }

    pub fn at_branch(mut self, branch_id: impl Into<String>) -> Self {
        self.branch_id = Some(branch_id.into());
        self
    }

    pub fn permissions(mut self, perms: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.permissions.extend(perms.into_iter().map(Into::into));
        self
    }
}

/// The authenticated user as seen by the decision engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    pub primary_role: PrimaryRole,
    pub branch_id: Option<String>,
    pub gym_id: Option<String>,
    /// Every branch owned by the principal's gym.
    #[serde(default)]
    pub tenant_branches: BTreeSet<String>,
    pub grants: Vec<RoleGrant>,
    pub allow: HashSet<String>,
    pub deny: HashSet<String>,
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The principal carries an explicit deny override.
    ExplicitDeny,
    /// No contributing role or allow override grants the permission.
    NotGranted,
    /// The requested branch belongs to another gym.
    OutsideTenant,
}

/// Outcome of a single decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Maps a deny onto a `Forbidden` error naming the permission.
    pub fn into_result(self, permission: &str) -> gym_access_core::AccessResult<()> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(DenyReason::ExplicitDeny) => Err(gym_access_core::AccessError::forbidden(
                format!("Permission '{}' is explicitly denied", permission),
            )),
            Self::Deny(DenyReason::NotGranted) => Err(gym_access_core::AccessError::forbidden(
                format!("Missing permission '{}'", permission),
            )),
            Self::Deny(DenyReason::OutsideTenant) => Err(gym_access_core::AccessError::forbidden(
                format!("Permission '{}' is not available outside your gym", permission),
            )),
        }
    }
}

impl Principal {
    /// Creates a principal with no grants or overrides.
    pub fn new(user_id: impl Into<String>, primary_role: PrimaryRole) -> Self {
        Self {
            user_id: user_id.into(),
            primary_role,
            branch_id: None,
            gym_id: None,
            tenant_branches: BTreeSet::new(),
            grants: Vec::new(),
            allow: HashSet::new(),
            deny: HashSet::new(),
        }
    }

    pub fn branch(mut self, branch_id: impl Into<String>) -> Self {
        self.branch_id = Some(branch_id.into());
        self
    }

    pub fn gym(mut self, gym_id: impl Into<String>) -> Self {
        self.gym_id = Some(gym_id.into());
        self
    }

    /// Records a branch as belonging to the principal's gym.
    pub fn tenant_branch(mut self, branch_id: impl Into<String>) -> Self {
        self.tenant_branches.insert(branch_id.into());
        self
    }

    pub fn grant(mut self, grant: RoleGrant) -> Self {
        self.grants.push(grant);
        self
    }

    pub fn allow(mut self, permission: impl Into<String>) -> Self {
        self.allow.insert(permission.into());
        self
    }

    pub fn deny(mut self, permission: impl Into<String>) -> Self {
        self.deny.insert(permission.into());
        self
    }

    /// The branch a grant is bound to, after falling back to the user's own.
    fn grant_branch<'a>(&'a self, grant: &'a RoleGrant) -> Option<&'a str> {
        match grant.scope {
            RoleScope::Global => None,
            RoleScope::Branch => grant.branch_id.as_deref().or(self.branch_id.as_deref()),
            RoleScope::SelfOnly => self.branch_id.as_deref(),
        }
    }

    /// Whether a grant's permissions count for a request at `branch`.
    fn contributes(&self, grant: &RoleGrant, branch: Option<&str>) -> bool {
        let Some(branch) = branch else {
            return true;
        };
        match grant.scope {
            RoleScope::Global => true,
            RoleScope::Branch | RoleScope::SelfOnly => self.grant_branch(grant) == Some(branch),
        }
    }

    /// Platform operators are not confined to one gym.
    pub fn is_platform(&self) -> bool {
        self.primary_role.is_platform()
    }

    /// Whether a record of `gym_id` is within the principal's tenant.
    ///
    /// Records without a gym are platform-level and only reachable by
    /// platform operators.
    pub fn same_tenant(&self, gym_id: Option<&str>) -> bool {
        if self.is_platform() {
            return true;
        }
        matches!((self.gym_id.as_deref(), gym_id), (Some(mine), Some(theirs)) if mine == theirs)
    }

    /// Whether `branch` belongs to the principal's gym.
    ///
    /// The user's own branch and the branches of their grants count even
    /// when the branch directory was not loaded.
    pub fn in_tenant(&self, branch: &str) -> bool {
        self.is_platform()
            || self.tenant_branches.contains(branch)
            || self.branch_id.as_deref() == Some(branch)
            || self.grants.iter().any(|g| self.grant_branch(g) == Some(branch))
    }

    /// Decides whether the principal holds `permission`, optionally at `branch`.
    ///
    /// An explicit deny is absolute, and nothing is granted at a branch of
    /// another gym. Otherwise the permission must come from a contributing
    /// role or an allow override; anything else is denied.
    pub fn decide(&self, permission: &str, branch: Option<&str>) -> Decision {
        if self.deny.contains(permission) {
            return Decision::Deny(DenyReason::ExplicitDeny);
        }
        if branch.is_some_and(|b| !self.in_tenant(b)) {
            return Decision::Deny(DenyReason::OutsideTenant);
        }

        let granted = self
            .grants
            .iter()
            .filter(|grant| self.contributes(grant, branch))
            .any(|grant| grant.permissions.contains(permission));

        if granted || self.allow.contains(permission) {
            Decision::Allow
        } else {
            Decision::Deny(DenyReason::NotGranted)
        }
    }

    /// Boolean form of [`Principal::decide`].
    pub fn can(&self, permission: &str, branch: Option<&str>) -> bool {
        self.decide(permission, branch).is_allowed()
    }

    /// True iff at least one permission is allowed.
    pub fn has_any_permission<S: AsRef<str>>(&self, permissions: &[S], branch: Option<&str>) -> bool {
        permissions.iter().any(|p| self.can(p.as_ref(), branch))
    }

    /// True iff every permission is allowed. An empty list is vacuously true.
    pub fn has_all_permissions<S: AsRef<str>>(&self, permissions: &[S], branch: Option<&str>) -> bool {
        permissions.iter().all(|p| self.can(p.as_ref(), branch))
    }

    /// Evaluates `resource.action`.
    pub fn can_access_resource(&self, resource: &str, action: &str, branch: Option<&str>) -> bool {
        self.can(&Permission::new(resource, action).to_string(), branch)
    }

    /// Whether the principal operates across every branch of their gym.
    pub fn is_global(&self) -> bool {
        self.primary_role.scope() == RoleScope::Global
            || self.grants.iter().any(|g| g.scope == RoleScope::Global)
    }

    /// Whether the principal may see data belonging to `branch_id`.
    pub fn can_access_branch(&self, branch_id: &str) -> bool {
        if !self.in_tenant(branch_id) {
            return false;
        }
        if self.is_global() || self.branch_id.as_deref() == Some(branch_id) {
            return true;
        }
        self.grants
            .iter()
            .filter(|g| g.scope.is_branch_bound())
            .any(|g| self.grant_branch(g) == Some(branch_id))
    }

    /// Branches the principal can see: own branch first, then granted
    /// branches, then for global principals the rest of their gym.
    pub fn branches(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        let own = self.branch_id.iter().map(String::as_str);
        let granted = self.grants.iter().filter_map(|g| self.grant_branch(g));
        let tenant = self
            .tenant_branches
            .iter()
            .map(String::as_str)
            .filter(|_| self.is_global());
        for branch in own.chain(granted).chain(tenant) {
            if seen.insert(branch) {
                out.push(branch.to_string());
            }
        }
        out
    }

    /// The derived permission set for a request at `branch`.
    ///
    /// Union of contributing role permissions and allow overrides, minus
    /// every denied permission. Empty at a branch of another gym.
    pub fn effective_permissions(&self, branch: Option<&str>) -> BTreeSet<String> {
        if branch.is_some_and(|b| !self.in_tenant(b)) {
            return BTreeSet::new();
        }
        self.grants
            .iter()
            .filter(|grant| self.contributes(grant, branch))
            .flat_map(|grant| grant.permissions.iter())
            .chain(self.allow.iter())
            .filter(|p| !self.deny.contains(*p))
            .cloned()
            .collect()
    }
}
