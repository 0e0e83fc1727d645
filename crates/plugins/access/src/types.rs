//! Persisted and interchange types for access control.

use chrono::{DateTime, Utc};
use gym_access_core::{RoleScope, User, UserExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Stored role row. Its permission links live in their own table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbRole {
    /// Role identifier.
    pub id: String,
    /// Machine key, unique case-insensitively.
    pub name: String,
    /// Human-readable name.
    pub display_name: String,
    pub description: Option<String>,
    /// Presentation only.
    pub color: Option<String>,
    /// Marks seeded roles that cannot be edited or deleted.
    pub is_system: bool,
    pub scope: RoleScope,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbRole {
    /// Creates a new custom role.
    pub fn new(id: impl Into<String>, name: impl Into<String>, scope: RoleScope) -> Self {
        let now = Utc::now();
        let name = name.into();
        Self {
            id: id.into(),
            display_name: name.clone(),
            name,
            description: None,
            color: None,
            is_system: false,
            scope,
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks this role as a system role.
    pub fn system(mut self) -> Self {
        self.is_system = true;
        self
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
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

    /// Case-insensitive name comparison.
    pub fn has_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Binds a user to a role, optionally at one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user_id: String,
    pub role_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RoleAssignment {
    pub fn new(user_id: impl Into<String>, role_id: impl Into<String>, branch_id: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role_id: role_id.into(),
            branch_id,
            created_at: Utc::now(),
        }
    }

    /// True when both rows bind the same user, role and branch.
    pub fn same_binding(&self, other: &RoleAssignment) -> bool {
        self.user_id == other.user_id && self.role_id == other.role_id && self.branch_id == other.branch_id
    }
}

/// Whether an override grants or withholds a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideEffect {
    Allow,
    Deny,
}

/// Per-user allow/deny lists layered on top of role permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverrides {
    #[serde(default)]
    pub allow: BTreeSet<String>,
    #[serde(default)]
    pub deny: BTreeSet<String>,
}

impl PermissionOverrides {
    /// Records an override; the opposite list loses the permission.
    pub fn set(&mut self, permission: &str, effect: OverrideEffect) {
        match effect {
            OverrideEffect::Allow => {
                self.deny.remove(permission);
                self.allow.insert(permission.to_string());
            }
            OverrideEffect::Deny => {
                self.allow.remove(permission);
                self.deny.insert(permission.to_string());
            }
        }
    }

    /// Drops any override for the permission. Returns whether one existed.
    pub fn clear(&mut self, permission: &str) -> bool {
        let allowed = self.allow.remove(permission);
        let denied = self.deny.remove(permission);
        allowed || denied
    }

    pub fn is_empty(&self) -> bool {
        self.allow.is_empty() && self.deny.is_empty()
    }
}

impl UserExtension for PermissionOverrides {
    const KEY: &'static str = "custom_permissions";

    fn from_user(user: &User) -> Option<Self> {
        user.get_extension(Self::KEY)
    }

    fn apply_to(&self, user: &mut User) {
        if self.is_empty() {
            user.remove_extension(Self::KEY);
        } else {
            user.set_extension(Self::KEY, self);
        }
    }
}

/// Typed accessors for the access-control data kept on a user.
pub trait AccessUserExt {
    /// The user's overrides, empty when none were set.
    fn permission_overrides(&self) -> PermissionOverrides;

    /// Replaces the user's overrides.
    fn set_permission_overrides(&mut self, overrides: &PermissionOverrides);
}

impl AccessUserExt for User {
    fn permission_overrides(&self) -> PermissionOverrides {
        PermissionOverrides::from_user(self).unwrap_or_default()
    }

    fn set_permission_overrides(&mut self, overrides: &PermissionOverrides) {
        overrides.apply_to(self);
    }
}

/// Request to create a custom role.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub scope: RoleScope,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Patch for a custom role's metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub scope: Option<RoleScope>,
}

/// Full replacement of a role's permission set.
#[derive(Debug, Clone, Deserialize)]
pub struct SetRolePermissionsRequest {
    pub permissions: Vec<String>,
}

/// Request to assign a role to a user.
#[derive(Debug, Clone, Deserialize)]
pub struct AssignRoleRequest {
    pub role_id: String,
    pub branch_id: Option<String>,
}

/// Request to set a permission override.
#[derive(Debug, Clone, Deserialize)]
pub struct SetOverrideRequest {
    pub effect: OverrideEffect,
}

/// Interchange shape of a role.
#[derive(Debug, Clone, Serialize)]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    pub role: DbRole,
    pub permissions: Vec<String>,
}

/// A role annotated with usage counts.
#[derive(Debug, Clone, Serialize)]
pub struct RoleWithCounts {
    #[serde(flatten)]
    pub role: DbRole,
    pub user_count: usize,
    pub permission_count: usize,
}

/// Outcome of deleting a custom role.
#[derive(Debug, Clone, Serialize)]
pub struct DeletedRole {
    pub role: DbRole,
    /// Users who held no other explicit assignment; the caller reassigns them.
    pub orphaned_users: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use gym_access_core::PrimaryRole;

    #[test]
    fn test_overrides_are_exclusive() {
        let mut overrides = PermissionOverrides::default();
        overrides.set("sms.send", OverrideEffect::Allow);
        overrides.set("sms.send", OverrideEffect::Deny);
        assert!(!overrides.allow.contains("sms.send"));
        assert!(overrides.deny.contains("sms.send"));
        assert!(overrides.clear("sms.send"));
        assert!(!overrides.clear("sms.send"));
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_overrides_stored_on_user() {
        let mut user = User::new("u1", "t@example.com", PrimaryRole::Trainer).branch("b1");
        assert!(user.permission_overrides().is_empty());

        let mut overrides = PermissionOverrides::default();
        overrides.set("trainer.schedule.view", OverrideEffect::Deny);
        user.set_permission_overrides(&overrides);
        assert_eq!(user.permission_overrides(), overrides);

        user.set_permission_overrides(&PermissionOverrides::default());
        assert!(!user.extensions.contains_key(PermissionOverrides::KEY));
    }

    #[test]
    fn test_role_interchange_shape() {
        let role = DbRole::new("r1", "front_desk", RoleScope::Branch).color("#22c55e");
        let json = serde_json::to_value(RoleWithPermissions {
            role,
            permissions: vec!["members.view".into()],
        })
        .unwrap();
        assert_eq!(json["name"], "front_desk");
        assert_eq!(json["display_name"], "front_desk");
        assert_eq!(json["scope"], "branch");
        assert_eq!(json["is_system"], false);
        assert_eq!(json["permissions"][0], "members.view");
    }
}
