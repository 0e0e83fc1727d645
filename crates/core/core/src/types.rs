//! Core data types for gym access control.
//!
//! This module defines the canonical `User` profile as the access-control
//! layer sees it, together with the coarse `PrimaryRole` classification and
//! the `RoleScope` boundary shared by every role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{AccessError, AccessResult};

/// The data-visibility boundary a role operates within.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleScope {
    /// Every branch of the tenant.
    Global,
    /// A single branch.
    Branch,
    /// Only the user's own records within their branch.
    #[serde(rename = "self")]
    SelfOnly,
}

impl RoleScope {
    /// Returns true when the scope is tied to a branch.
    pub fn is_branch_bound(&self) -> bool {
        matches!(self, Self::Branch | Self::SelfOnly)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Branch => "branch",
            Self::SelfOnly => "self",
        }
    }
}

impl fmt::Display for RoleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse role carried on every user profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryRole {
    SuperAdmin,
    Admin,
    Manager,
    Staff,
    Trainer,
    Team,
    Member,
}

impl PrimaryRole {
    /// Returns all primary roles, most privileged first.
    pub const fn all() -> &'static [Self] {
        &[
            Self::SuperAdmin,
            Self::Admin,
            Self::Manager,
            Self::Staff,
            Self::Trainer,
            Self::Team,
            Self::Member,
        ]
    }

    /// Machine key, matching the name of the seeded system role.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Staff => "staff",
            Self::Trainer => "trainer",
            Self::Team => "team",
            Self::Member => "member",
        }
    }

    /// The scope a user holding this role operates within.
    pub const fn scope(&self) -> RoleScope {
        match self {
            Self::SuperAdmin | Self::Admin => RoleScope::Global,
            Self::Manager | Self::Staff | Self::Trainer | Self::Team => RoleScope::Branch,
            Self::Member => RoleScope::SelfOnly,
        }
    }

    /// Platform operators are not tied to a tenant.
    pub const fn is_platform(&self) -> bool {
        matches!(self, Self::SuperAdmin)
    }
}

impl fmt::Display for PrimaryRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrimaryRole {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|role| role.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AccessError::validation(format!("Unknown primary role '{}'", s)))
    }
}

/// A gym user as seen by the access-control layer.
///
/// Base fields are always present. The `extensions` map holds plugin data
/// (such as custom permission overrides) behind typed accessor traits.
///
/// # Example
///
/// ```rust
/// use gym_access_core::{PrimaryRole, User};
///
/// let user = User::new("u1", "coach@example.com", PrimaryRole::Trainer).branch("downtown");
/// assert_eq!(user.branch_id.as_deref(), Some("downtown"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier for the user
    pub id: String,

    /// User's email address
    pub email: String,

    /// Optional display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Exactly one primary role at a time
    pub role: PrimaryRole,

    /// Sub-classification for `team` users (reception, accountant, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_role: Option<String>,

    /// Branch the user belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,

    /// Tenant the user belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gym_id: Option<String>,

    /// Timestamp when the user was created
    pub created_at: DateTime<Utc>,

    /// Timestamp when the user was last updated
    pub updated_at: DateTime<Utc>,

    /// Extension data from plugins.
    #[serde(default, flatten)]
    pub extensions: HashMap<String, Value>,
}

impl User {
    /// Creates a new user with the given ID, email and primary role.
    pub fn new(id: impl Into<String>, email: impl Into<String>, role: PrimaryRole) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            email: email.into(),
            name: None,
            role,
            team_role: None,
            branch_id: None,
            gym_id: None,
            created_at: now,
            updated_at: now,
            extensions: HashMap::new(),
        }
    }

    /// Sets the display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the branch affiliation.
    pub fn branch(mut self, branch_id: impl Into<String>) -> Self {
        self.branch_id = Some(branch_id.into());
        self
    }

    /// Sets the tenant affiliation.
    pub fn gym(mut self, gym_id: impl Into<String>) -> Self {
        self.gym_id = Some(gym_id.into());
        self
    }

    /// Sets the team sub-classification.
    pub fn team_role(mut self, team_role: impl Into<String>) -> Self {
        self.team_role = Some(team_role.into());
        self
    }

    /// Checks the affiliation invariants implied by the primary role.
    ///
    /// Every user except a platform operator belongs to a gym. Branch-bound
    /// roles also need a branch.
    pub fn validate(&self) -> AccessResult<()> {
        if self.id.trim().is_empty() {
            return Err(AccessError::validation("User id is required"));
        }

        if self.gym_id.is_none() && !self.role.is_platform() {
            return Err(AccessError::validation(format!(
                "Users with role '{}' must belong to a gym",
                self.role
            )));
        }

        if self.role.scope().is_branch_bound() && self.branch_id.is_none() {
            return Err(AccessError::validation(format!(
                "Users with role '{}' must belong to a branch",
                self.role
            )));
        }

        Ok(())
    }

    /// Whether the user belongs to `gym_id`.
    pub fn in_gym(&self, gym_id: &str) -> bool {
        self.gym_id.as_deref() == Some(gym_id)
    }

    /// Gets an extension value by key, deserializing it to the requested type.
    ///
    /// Returns `None` if the key doesn't exist or deserialization fails.
    pub fn get_extension<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.extensions
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Sets an extension value by key.
    pub fn set_extension<T: Serialize>(&mut self, key: &str, value: T) {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.extensions.insert(key.to_string(), json_value);
            self.updated_at = Utc::now();
        }
    }

    /// Removes an extension value by key.
    pub fn remove_extension(&mut self, key: &str) -> Option<Value> {
        let result = self.extensions.remove(key);
        if result.is_some() {
            self.updated_at = Utc::now();
        }
        result
    }
}

/// A physical location of a gym.
///
/// Branch ids are unique across the platform; each one belongs to exactly
/// one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    pub gym_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Branch {
    pub fn new(id: impl Into<String>, gym_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            gym_id: gym_id.into(),
            name: None,
            created_at: Utc::now(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_role_scopes() {
        assert_eq!(PrimaryRole::SuperAdmin.scope(), RoleScope::Global);
        assert_eq!(PrimaryRole::Manager.scope(), RoleScope::Branch);
        assert_eq!(PrimaryRole::Member.scope(), RoleScope::SelfOnly);
        assert_eq!("TRAINER".parse::<PrimaryRole>().unwrap(), PrimaryRole::Trainer);
        assert!("owner".parse::<PrimaryRole>().is_err());
    }

    #[test]
    fn test_scope_serializes_self() {
        let json = serde_json::to_string(&RoleScope::SelfOnly).unwrap();
        assert_eq!(json, "\"self\"");
        let scope: RoleScope = serde_json::from_str("\"branch\"").unwrap();
        assert_eq!(scope, RoleScope::Branch);
    }

    #[test]
    fn test_branch_required_for_branch_roles() {
        let user = User::new("u1", "staff@example.com", PrimaryRole::Staff).gym("g1");
        assert!(user.validate().is_err());
        assert!(user.branch("b1").validate().is_ok());
    }

    #[test]
    fn test_gym_required_for_everyone_but_operators() {
        let admin = User::new("u1", "admin@example.com", PrimaryRole::Admin);
        assert!(admin.validate().is_err());
        assert!(admin.gym("g1").validate().is_ok());

        let trainer = User::new("u3", "coach@example.com", PrimaryRole::Trainer).branch("b1");
        assert!(trainer.validate().is_err());
        assert!(trainer.gym("g1").validate().is_ok());

        let operator = User::new("u2", "ops@example.com", PrimaryRole::SuperAdmin);
        assert!(operator.validate().is_ok());
        assert!(!operator.in_gym("g1"));
    }

    #[test]
    fn test_user_extensions() {
        let mut user = User::new("u1", "member@example.com", PrimaryRole::Member);
        user.set_extension("locker", 42);
        assert_eq!(user.get_extension::<i32>("locker"), Some(42));
        assert!(user.remove_extension("locker").is_some());
        assert_eq!(user.get_extension::<i32>("locker"), None);
    }
}
