//! Access gates.
//!
//! A [`Requirement`] describes what a protected element or route needs. The
//! same requirement is evaluated by the HTTP guard and by UI adapters, which
//! only decide what to show for each [`GateOutcome`].

use serde::{Deserialize, Serialize};

use crate::engine::Principal;

/// What a protected element demands of the principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Requirement {
    /// A single permission.
    Permission { permission: String },
    /// At least one of the permissions.
    Any { permissions: Vec<String> },
    /// Every one of the permissions.
    All { permissions: Vec<String> },
    /// The `resource.action` permission.
    Resource { resource: String, action: String },
    /// Visibility of a branch.
    Branch { branch_id: String },
}

impl Requirement {
    pub fn permission(permission: impl Into<String>) -> Self {
        Self::Permission {
            permission: permission.into(),
        }
    }

    pub fn any(permissions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Any {
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn all(permissions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::All {
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn resource(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self::Resource {
            resource: resource.into(),
            action: action.into(),
        }
    }

    pub fn branch(branch_id: impl Into<String>) -> Self {
        Self::Branch {
            branch_id: branch_id.into(),
        }
    }

    /// Evaluates the requirement for a request at `branch`.
    pub fn is_satisfied_by(&self, principal: &Principal, branch: Option<&str>) -> bool {
        match self {
            Self::Permission { permission } => principal.can(permission, branch),
            Self::Any { permissions } => principal.has_any_permission(permissions.as_slice(), branch),
            Self::All { permissions } => principal.has_all_permissions(permissions.as_slice(), branch),
            Self::Resource { resource, action } => principal.can_access_resource(resource, action, branch),
            Self::Branch { branch_id } => principal.can_access_branch(branch_id),
        }
    }

    /// Short human description, used in denial messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Permission { permission } => format!("permission '{}'", permission),
            Self::Any { permissions } => format!("any of [{}]", permissions.join(", ")),
            Self::All { permissions } => format!("all of [{}]", permissions.join(", ")),
            Self::Resource { resource, action } => format!("permission '{}.{}'", resource, action),
            Self::Branch { branch_id } => format!("access to branch '{}'", branch_id),
        }
    }
}

/// What a UI gate should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOutcome {
    /// The principal snapshot is still being fetched; show a placeholder.
    Loading,
    /// Render the protected content.
    Render,
    /// Render the fallback, or nothing.
    Fallback,
}

/// Decides what a conditional-render gate shows.
///
/// `principal` is `None` while the snapshot is loading.
pub fn gate(requirement: &Requirement, principal: Option<&Principal>, branch: Option<&str>) -> GateOutcome {
    match principal {
        None => GateOutcome::Loading,
        Some(p) if requirement.is_satisfied_by(p, branch) => GateOutcome::Render,
        Some(_) => GateOutcome::Fallback,
    }
}
