//! # Gym Access Memory Adapter
//!
//! An in-memory storage adapter for gym access control, primarily intended
//! for testing and development purposes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gym_access_adapter_memory::MemoryAdapter;
//!
//! let adapter = Arc::new(MemoryAdapter::new());
//! let access = AccessControl::new(AccessConfig::gym_defaults(), adapter);
//! ```

use async_trait::async_trait;
use chrono::Utc;
use gym_access_core::error::{AccessError, AccessResult};
use gym_access_core::traits::StorageAdapter;
use gym_access_core::types::{Branch, User};
use gym_access_rbac::{AccessStorageExt, DbRole, RoleAssignment};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage for a single entity type.
type Store<T> = Arc<RwLock<HashMap<String, T>>>;

/// Role, permission-link and assignment tables.
///
/// Kept behind one lock so cascading deletes apply as a single unit.
#[derive(Debug, Default)]
struct AccessTables {
    roles: HashMap<String, DbRole>,
    role_permissions: HashMap<String, BTreeSet<String>>,
    assignments: Vec<RoleAssignment>,
}

/// In-memory storage adapter.
///
/// This adapter stores all data in memory and is suitable for
/// testing and development. Data is lost when the process exits.
#[derive(Debug, Clone)]
pub struct MemoryAdapter {
    users: Store<User>,
    branches: Store<Branch>,
    access: Arc<RwLock<AccessTables>>,
}

impl MemoryAdapter {
    /// Creates a new in-memory adapter.
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            branches: Arc::new(RwLock::new(HashMap::new())),
            access: Arc::new(RwLock::new(AccessTables::default())),
        }
    }

    /// Clears all stored data.
    pub async fn clear(&self) {
        self.users.write().await.clear();
        self.branches.write().await.clear();
        let mut access = self.access.write().await;
        access.roles.clear();
        access.role_permissions.clear();
        access.assignments.clear();
    }

    /// Returns the number of users stored.
    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }

    /// Returns the number of assignment rows stored.
    pub async fn assignment_count(&self) -> usize {
        self.access.read().await.assignments.len()
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    async fn create_user(&self, user: &User) -> AccessResult<User> {
        let mut users = self.users.write().await;

        if users.contains_key(&user.id) {
            return Err(AccessError::duplicate("user", "id", &user.id));
        }
        if users.values().any(|u| u.email == user.email) {
            return Err(AccessError::duplicate("user", "email", &user.email));
        }

        users.insert(user.id.clone(), user.clone());
        Ok(user.clone())
    }

    async fn get_user_by_id(&self, id: &str) -> AccessResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(id).cloned())
    }

    async fn list_users(&self) -> AccessResult<Vec<User>> {
        let users = self.users.read().await;
        let mut out: Vec<User> = users.values().cloned().collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn update_user(&self, user: &User) -> AccessResult<User> {
        let mut users = self.users.write().await;

        if !users.contains_key(&user.id) {
            return Err(AccessError::not_found("user", "id", &user.id));
        }

        users.insert(user.id.clone(), user.clone());
        Ok(user.clone())
    }

    async fn delete_user(&self, id: &str) -> AccessResult<()> {
        let mut users = self.users.write().await;
        let mut access = self.access.write().await;

        users.remove(id);
        access.assignments.retain(|a| a.user_id != id);

        Ok(())
    }

    async fn create_branch(&self, branch: &Branch) -> AccessResult<Branch> {
        let mut branches = self.branches.write().await;

        if branches.contains_key(&branch.id) {
            return Err(AccessError::duplicate("branch", "id", &branch.id));
        }

        branches.insert(branch.id.clone(), branch.clone());
        Ok(branch.clone())
    }

    async fn get_branch(&self, id: &str) -> AccessResult<Option<Branch>> {
        let branches = self.branches.read().await;
        Ok(branches.get(id).cloned())
    }

    async fn list_branches(&self, gym_id: &str) -> AccessResult<Vec<Branch>> {
        let branches = self.branches.read().await;
        let mut out: Vec<Branch> = branches.values().filter(|b| b.gym_id == gym_id).cloned().collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }
}

// ==================== Access Control Extension ====================

#[async_trait]
impl AccessStorageExt for MemoryAdapter {
    async fn create_role(&self, role: &DbRole, permissions: &[String]) -> AccessResult<DbRole> {
        let mut access = self.access.write().await;

        if access.roles.contains_key(&role.id) {
            return Err(AccessError::duplicate("role", "id", &role.id));
        }
        if access.roles.values().any(|r| r.has_name(&role.name)) {
            return Err(AccessError::duplicate("role", "name", &role.name));
        }

        access.roles.insert(role.id.clone(), role.clone());
        access
            .role_permissions
            .insert(role.id.clone(), permissions.iter().cloned().collect());
        Ok(role.clone())
    }

    async fn get_role(&self, id: &str) -> AccessResult<Option<DbRole>> {
        let access = self.access.read().await;
        Ok(access.roles.get(id).cloned())
    }

    async fn get_role_by_name(&self, name: &str) -> AccessResult<Option<DbRole>> {
        let access = self.access.read().await;
        Ok(access.roles.values().find(|r| r.has_name(name)).cloned())
    }

    async fn list_roles(&self) -> AccessResult<Vec<DbRole>> {
        let access = self.access.read().await;
        let mut roles: Vec<DbRole> = access.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(roles)
    }

    async fn update_role(&self, role: &DbRole) -> AccessResult<DbRole> {
        let mut access = self.access.write().await;

        if !access.roles.contains_key(&role.id) {
            return Err(AccessError::not_found("role", "id", &role.id));
        }
        if access
            .roles
            .values()
            .any(|r| r.id != role.id && r.has_name(&role.name))
        {
            return Err(AccessError::duplicate("role", "name", &role.name));
        }

        access.roles.insert(role.id.clone(), role.clone());
        Ok(role.clone())
    }

    async fn update_role_with_permissions(&self, role: &DbRole, permissions: &[String]) -> AccessResult<DbRole> {
        let mut access = self.access.write().await;

        if !access.roles.contains_key(&role.id) {
            return Err(AccessError::not_found("role", "id", &role.id));
        }
        if access
            .roles
            .values()
            .any(|r| r.id != role.id && r.has_name(&role.name))
        {
            return Err(AccessError::duplicate("role", "name", &role.name));
        }

        let mut stored = role.clone();
        stored.updated_at = Utc::now();
        access.roles.insert(stored.id.clone(), stored.clone());
        access
            .role_permissions
            .insert(stored.id.clone(), permissions.iter().cloned().collect());
        Ok(stored)
    }

    async fn delete_role(&self, id: &str) -> AccessResult<Vec<RoleAssignment>> {
        let mut access = self.access.write().await;

        match access.roles.get(id) {
            None => return Err(AccessError::not_found("role", "id", id)),
            Some(role) if role.is_system => {
                return Err(AccessError::forbidden("Cannot delete system roles"));
            }
            Some(_) => {}
        }

        access.roles.remove(id);
        access.role_permissions.remove(id);

        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut access.assignments)
            .into_iter()
            .partition(|a| a.role_id == id);
        access.assignments = kept;

        Ok(removed)
    }

    async fn get_role_permissions(&self, role_id: &str) -> AccessResult<Vec<String>> {
        let access = self.access.read().await;
        Ok(access
            .role_permissions
            .get(role_id)
            .map(|perms| perms.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn replace_role_permissions(&self, role_id: &str, permissions: &[String]) -> AccessResult<()> {
        let mut access = self.access.write().await;

        let Some(role) = access.roles.get_mut(role_id) else {
            return Err(AccessError::not_found("role", "id", role_id));
        };
        role.updated_at = Utc::now();

        access
            .role_permissions
            .insert(role_id.to_string(), permissions.iter().cloned().collect());
        Ok(())
    }

    async fn insert_assignment(&self, assignment: &RoleAssignment) -> AccessResult<bool> {
        let mut access = self.access.write().await;

        if !access.roles.contains_key(&assignment.role_id) {
            return Err(AccessError::not_found("role", "id", &assignment.role_id));
        }
        if access.assignments.iter().any(|a| a.same_binding(assignment)) {
            return Ok(false);
        }

        access.assignments.push(assignment.clone());
        Ok(true)
    }

    async fn delete_assignments(&self, user_id: &str, role_id: &str) -> AccessResult<usize> {
        let mut access = self.access.write().await;
        let before = access.assignments.len();
        access
            .assignments
            .retain(|a| !(a.user_id == user_id && a.role_id == role_id));
        Ok(before - access.assignments.len())
    }

    async fn list_user_assignments(&self, user_id: &str) -> AccessResult<Vec<RoleAssignment>> {
        let access = self.access.read().await;
        Ok(access
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_role_assignments(&self, role_id: &str) -> AccessResult<Vec<RoleAssignment>> {
        let access = self.access.read().await;
        Ok(access
            .assignments
            .iter()
            .filter(|a| a.role_id == role_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gym_access_core::{PrimaryRole, RoleScope};

    fn perms(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let adapter = MemoryAdapter::new();
        let user = User::new("u1", "member@example.com", PrimaryRole::Member)
            .branch("b1")
            .gym("g1");

        adapter.create_user(&user).await.unwrap();
        let fetched = adapter.get_user_by_id("u1").await.unwrap().unwrap();
        assert_eq!(fetched.email, "member@example.com");
        assert!(adapter.create_user(&user).await.is_err());
    }

    #[tokio::test]
    async fn test_role_names_are_case_insensitive() {
        let adapter = MemoryAdapter::new();
        adapter
            .create_role(&DbRole::new("r1", "Front_Desk", RoleScope::Branch), &[])
            .await
            .unwrap();

        assert!(adapter.get_role_by_name("front_desk").await.unwrap().is_some());
        let dup = adapter
            .create_role(&DbRole::new("r2", "FRONT_DESK", RoleScope::Branch), &[])
            .await;
        assert!(matches!(dup, Err(AccessError::DuplicateEntry { .. })));
    }

    #[tokio::test]
    async fn test_delete_role_cascades() {
        let adapter = MemoryAdapter::new();
        adapter
            .create_role(&DbRole::new("r1", "coach", RoleScope::Branch), &perms(&["classes.view"]))
            .await
            .unwrap();
        adapter
            .insert_assignment(&RoleAssignment::new("u1", "r1", Some("b1".into())))
            .await
            .unwrap();
        adapter
            .insert_assignment(&RoleAssignment::new("u1", "r1", Some("b2".into())))
            .await
            .unwrap();

        let removed = adapter.delete_role("r1").await.unwrap();
        assert_eq!(removed.len(), 2);
        assert!(adapter.get_role("r1").await.unwrap().is_none());
        assert!(adapter.get_role_permissions("r1").await.unwrap().is_empty());
        assert_eq!(adapter.assignment_count().await, 0);
    }

    #[tokio::test]
    async fn test_system_role_cannot_be_deleted() {
        let adapter = MemoryAdapter::new();
        let role = DbRole::new("admin", "admin", RoleScope::Global).system();
        adapter.create_role(&role, &perms(&["members.view"])).await.unwrap();

        let result = adapter.delete_role("admin").await;
        assert!(matches!(result, Err(AccessError::Forbidden { .. })));
        assert_eq!(adapter.get_role_permissions("admin").await.unwrap(), perms(&["members.view"]));
    }

    #[tokio::test]
    async fn test_insert_assignment_is_idempotent() {
        let adapter = MemoryAdapter::new();
        adapter
            .create_role(&DbRole::new("r1", "coach", RoleScope::Branch), &[])
            .await
            .unwrap();

        let row = RoleAssignment::new("u1", "r1", Some("b1".into()));
        assert!(adapter.insert_assignment(&row).await.unwrap());
        assert!(!adapter.insert_assignment(&row.clone()).await.unwrap());
        assert_eq!(adapter.list_user_assignments("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_role_permissions() {
        let adapter = MemoryAdapter::new();
        adapter
            .create_role(
                &DbRole::new("r1", "coach", RoleScope::Branch),
                &perms(&["classes.view", "classes.edit"]),
            )
            .await
            .unwrap();

        adapter.replace_role_permissions("r1", &perms(&["members.view"])).await.unwrap();
        assert_eq!(adapter.get_role_permissions("r1").await.unwrap(), perms(&["members.view"]));

        assert!(adapter.replace_role_permissions("missing", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_update_role_with_permissions_writes_both_or_neither() {
        let adapter = MemoryAdapter::new();
        adapter
            .create_role(&DbRole::new("r1", "coach", RoleScope::Branch), &perms(&["classes.view"]))
            .await
            .unwrap();
        adapter
            .create_role(&DbRole::new("r2", "porter", RoleScope::Branch), &[])
            .await
            .unwrap();

        let renamed = DbRole::new("r1", "head_coach", RoleScope::Branch).display_name("Head Coach");
        let stored = adapter
            .update_role_with_permissions(&renamed, &perms(&["classes.edit", "classes.view"]))
            .await
            .unwrap();
        assert_eq!(stored.display_name, "Head Coach");
        assert_eq!(
            adapter.get_role_permissions("r1").await.unwrap(),
            perms(&["classes.edit", "classes.view"])
        );

        let clash = DbRole::new("r1", "porter", RoleScope::Branch);
        let result = adapter.update_role_with_permissions(&clash, &[]).await;
        assert!(matches!(result, Err(AccessError::DuplicateEntry { .. })));
        assert_eq!(adapter.get_role("r1").await.unwrap().unwrap().name, "head_coach");
        assert_eq!(adapter.get_role_permissions("r1").await.unwrap().len(), 2);

        let missing = DbRole::new("r9", "ghost", RoleScope::Branch);
        assert!(adapter.update_role_with_permissions(&missing, &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_branches_are_listed_per_gym() {
        let adapter = MemoryAdapter::new();
        adapter.create_branch(&Branch::new("b1", "g1")).await.unwrap();
        adapter.create_branch(&Branch::new("b2", "g2")).await.unwrap();
        adapter.create_branch(&Branch::new("b3", "g1").name("Uptown")).await.unwrap();

        let ids: Vec<String> = adapter
            .list_branches("g1")
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"b1".to_string()) && ids.contains(&"b3".to_string()));

        let dup = adapter.create_branch(&Branch::new("b1", "g2")).await;
        assert!(matches!(dup, Err(AccessError::DuplicateEntry { .. })));
        assert_eq!(adapter.get_branch("b1").await.unwrap().unwrap().gym_id, "g1");
    }
}
