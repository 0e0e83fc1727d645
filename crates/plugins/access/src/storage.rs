//! Storage trait for access control operations.

use async_trait::async_trait;
use gym_access_core::{AccessResult, StorageAdapter};

use crate::types::{DbRole, RoleAssignment};

/// Trait for access control storage operations.
///
/// Every method is a single unit of work: implementations must either apply
/// a write completely or leave the prior state untouched.
#[async_trait]
pub trait AccessStorageExt: Send + Sync {
    // ==================== Role Operations ====================

    /// Creates a role together with its permission links.
    async fn create_role(&self, role: &DbRole, permissions: &[String]) -> AccessResult<DbRole>;

    /// Gets a role by ID.
    async fn get_role(&self, id: &str) -> AccessResult<Option<DbRole>>;

    /// Gets a role by machine name, case-insensitively.
    async fn get_role_by_name(&self, name: &str) -> AccessResult<Option<DbRole>>;

    /// Lists all roles, ordered by creation.
    async fn list_roles(&self) -> AccessResult<Vec<DbRole>>;

    /// Updates a role's metadata.
    async fn update_role(&self, role: &DbRole) -> AccessResult<DbRole>;

    /// Updates a role's metadata and replaces its permission set in one write.
    async fn update_role_with_permissions(&self, role: &DbRole, permissions: &[String]) -> AccessResult<DbRole>;

    /// Deletes a role, its permission links and its assignments.
    /// Returns the assignments that were removed.
    async fn delete_role(&self, id: &str) -> AccessResult<Vec<RoleAssignment>>;

    // ==================== Role-Permission Links ====================

    /// Gets the permission ids attached to a role, sorted.
    async fn get_role_permissions(&self, role_id: &str) -> AccessResult<Vec<String>>;

    /// Replaces a role's permission set wholesale.
    async fn replace_role_permissions(&self, role_id: &str, permissions: &[String]) -> AccessResult<()>;

    // ==================== Assignments ====================

    /// Inserts an assignment. Returns false if the same binding already existed.
    async fn insert_assignment(&self, assignment: &RoleAssignment) -> AccessResult<bool>;

    /// Removes every assignment of the role to the user. Returns how many were removed.
    async fn delete_assignments(&self, user_id: &str, role_id: &str) -> AccessResult<usize>;

    /// Lists a user's assignments in creation order.
    async fn list_user_assignments(&self, user_id: &str) -> AccessResult<Vec<RoleAssignment>>;

    /// Lists every assignment of a role.
    async fn list_role_assignments(&self, role_id: &str) -> AccessResult<Vec<RoleAssignment>>;
}

/// Everything the access-control service needs from one backing store.
pub trait AccessStore: StorageAdapter + AccessStorageExt {}

impl<T: StorageAdapter + AccessStorageExt> AccessStore for T {}
