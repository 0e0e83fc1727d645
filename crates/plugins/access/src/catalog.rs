//! The permission catalog.
//!
//! Every capability string the platform understands is declared here. UI
//! elements and API routes reference these identifiers literally, so new
//! permissions ship with a deploy rather than being created at runtime.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Functional area a permission belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionModule {
    Members,
    Memberships,
    Finance,
    Scheduling,
    Equipment,
    Lockers,
    Staff,
    Attendance,
    Devices,
    Sms,
    Trainer,
    Branches,
    Roles,
    Reports,
    Feedback,
}

impl PermissionModule {
    pub const fn all() -> &'static [Self] {
        &[
            Self::Members,
            Self::Memberships,
            Self::Finance,
            Self::Scheduling,
            Self::Equipment,
            Self::Lockers,
            Self::Staff,
            Self::Attendance,
            Self::Devices,
            Self::Sms,
            Self::Trainer,
            Self::Branches,
            Self::Roles,
            Self::Reports,
            Self::Feedback,
        ]
    }

    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Members => "Members",
            Self::Memberships => "Memberships",
            Self::Finance => "Finance",
            Self::Scheduling => "Scheduling",
            Self::Equipment => "Equipment",
            Self::Lockers => "Lockers",
            Self::Staff => "Staff",
            Self::Attendance => "Attendance",
            Self::Devices => "Devices",
            Self::Sms => "SMS",
            Self::Trainer => "Trainer",
            Self::Branches => "Branches",
            Self::Roles => "Roles & Permissions",
            Self::Reports => "Reports",
            Self::Feedback => "Feedback",
        }
    }
}

/// A catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PermissionDef {
    /// Capability identifier, `resource.action`.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    pub module: PermissionModule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
}

const fn perm(id: &'static str, name: &'static str, module: PermissionModule) -> PermissionDef {
    PermissionDef {
        id,
        name,
        module,
        description: None,
    }
}

const fn described(
    id: &'static str,
    name: &'static str,
    module: PermissionModule,
    description: &'static str,
) -> PermissionDef {
    PermissionDef {
        id,
        name,
        module,
        description: Some(description),
    }
}

use self::PermissionModule as M;

static CATALOG: &[PermissionDef] = &[
    // Members
    perm("members.view", "View members", M::Members),
    perm("members.create", "Create members", M::Members),
    perm("members.edit", "Edit members", M::Members),
    perm("members.delete", "Delete members", M::Members),
    described("members.export", "Export members", M::Members, "Download member lists as CSV"),
    // Memberships
    perm("memberships.view", "View memberships", M::Memberships),
    described("memberships.assign", "Assign memberships", M::Memberships, "Sell or assign a plan to a member"),
    perm("memberships.edit", "Edit membership plans", M::Memberships),
    // Finance
    perm("finance.view", "View transactions", M::Finance),
    perm("finance.create", "Record transactions", M::Finance),
    perm("finance.edit", "Edit transactions", M::Finance),
    described("finance.process", "Process payments", M::Finance, "Collect payments and issue invoices"),
    perm("finance.refund", "Issue refunds", M::Finance),
    perm("finance.reports", "View financial reports", M::Finance),
    // Scheduling
    perm("classes.view", "View classes", M::Scheduling),
    perm("classes.create", "Create classes", M::Scheduling),
    perm("classes.edit", "Edit classes", M::Scheduling),
    perm("classes.delete", "Delete classes", M::Scheduling),
    perm("classes.book", "Book classes", M::Scheduling),
    // Equipment
    perm("equipment.view", "View equipment", M::Equipment),
    perm("equipment.create", "Add equipment", M::Equipment),
    perm("equipment.edit", "Edit equipment", M::Equipment),
    perm("equipment.delete", "Remove equipment", M::Equipment),
    perm("equipment.maintenance", "Log maintenance", M::Equipment),
    // Lockers
    perm("lockers.view", "View lockers", M::Lockers),
    perm("lockers.assign", "Assign lockers", M::Lockers),
    perm("lockers.release", "Release lockers", M::Lockers),
    perm("lockers.manage", "Manage locker inventory", M::Lockers),
    // Staff
    perm("staff.view", "View staff", M::Staff),
    perm("staff.create", "Hire staff", M::Staff),
    perm("staff.edit", "Edit staff", M::Staff),
    perm("staff.delete", "Remove staff", M::Staff),
    // Attendance
    perm("attendance.view", "View attendance", M::Attendance),
    perm("attendance.mark", "Mark attendance", M::Attendance),
    perm("attendance.export", "Export attendance", M::Attendance),
    // Devices
    perm("devices.view", "View access devices", M::Devices),
    perm("devices.manage", "Manage access devices", M::Devices),
    described("devices.sync", "Sync devices", M::Devices, "Push member credentials to turnstiles"),
    // SMS
    perm("sms.view", "View SMS history", M::Sms),
    perm("sms.send", "Send SMS", M::Sms),
    perm("sms.templates", "Manage SMS templates", M::Sms),
    // Trainer
    perm("trainer.view", "View trainers", M::Trainer),
    perm("trainer.assign", "Assign trainers", M::Trainer),
    perm("trainer.schedule.view", "View trainer schedule", M::Trainer),
    perm("trainer.schedule.edit", "Edit trainer schedule", M::Trainer),
    perm("trainer.clients.view", "View assigned clients", M::Trainer),
    perm("trainer.workouts.create", "Create workout plans", M::Trainer),
    perm("trainer.diets.create", "Create diet plans", M::Trainer),
    // Branches
    perm("branches.view", "View branches", M::Branches),
    perm("branches.create", "Create branches", M::Branches),
    perm("branches.edit", "Edit branches", M::Branches),
    // Roles
    perm("roles.view", "View roles", M::Roles),
    described("roles.manage", "Manage roles", M::Roles, "Create roles and change who holds them"),
    // Reports
    perm("reports.view", "View reports", M::Reports),
    perm("reports.export", "Export reports", M::Reports),
    // Feedback
    perm("feedback.view", "View feedback", M::Feedback),
    perm("feedback.respond", "Respond to feedback", M::Feedback),
];

/// Read-only view over the permission catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct Catalog;

impl Catalog {
    /// All permissions, in declaration order.
    pub fn list_all() -> &'static [PermissionDef] {
        CATALOG
    }

    /// All permissions belonging to one module.
    pub fn list_by_module(module: PermissionModule) -> Vec<&'static PermissionDef> {
        CATALOG.iter().filter(|p| p.module == module).collect()
    }

    /// Looks up a permission by identifier.
    pub fn get(id: &str) -> Option<&'static PermissionDef> {
        CATALOG.iter().find(|p| p.id == id)
    }

    pub fn contains(id: &str) -> bool {
        Self::get(id).is_some()
    }

    /// Returns the identifiers in `ids` that the catalog does not know.
    pub fn unknown<'a>(ids: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
        ids.into_iter().filter(|id| !Self::contains(id)).collect()
    }

    /// Permissions grouped by module, for role editors.
    pub fn grouped() -> BTreeMap<PermissionModule, Vec<&'static PermissionDef>> {
        let mut groups: BTreeMap<PermissionModule, Vec<&'static PermissionDef>> = BTreeMap::new();
        for def in CATALOG {
            groups.entry(def.module).or_default().push(def);
        }
        groups
    }

    /// Every identifier, for roles that hold the full catalog.
    pub fn all_ids() -> impl Iterator<Item = &'static str> {
        CATALOG.iter().map(|p| p.id)
    }
}

/// A parsed capability identifier.
///
/// The action is the segment after the last dot, so `trainer.schedule.view`
/// parses to resource `trainer.schedule` and action `view`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Permission {
    pub resource: String,
    pub action: String,
}

impl Permission {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }

    /// Parses a permission string. Returns `None` when either part is empty.
    pub fn parse(s: &str) -> Option<Self> {
        let (resource, action) = s.rsplit_once('.')?;
        if resource.is_empty() || action.is_empty() {
            return None;
        }
        Some(Self::new(resource, action))
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.action)
    }
}
