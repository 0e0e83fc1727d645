//! Core traits for gym access control.
//!
//! This module defines the storage contract that adapters implement for the
//! user records the access-control layer reads, plus the extension hook
//! plugins use to keep typed data on a `User`.

use async_trait::async_trait;

use crate::error::AccessResult;
use crate::types::{Branch, User};

/// Trait for extending the User model with plugin-specific data.
///
/// Plugins implement this trait to provide type-safe accessors for
/// their extension fields stored in the User's `extensions` map.
pub trait UserExtension: Sized {
    /// The key under which the extension is stored.
    const KEY: &'static str;

    /// Extracts the extension data from a User.
    fn from_user(user: &User) -> Option<Self>;

    /// Applies the extension data to a User.
    fn apply_to(&self, user: &mut User);
}

/// Trait for user storage.
///
/// User CRUD belongs to the wider gym platform; access control only needs
/// to look profiles up, persist the overrides it keeps on them, and know
/// which gym owns each branch.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Creates a new user.
    async fn create_user(&self, user: &User) -> AccessResult<User>;

    /// Gets a user by ID.
    async fn get_user_by_id(&self, id: &str) -> AccessResult<Option<User>>;

    /// Lists every user.
    async fn list_users(&self) -> AccessResult<Vec<User>>;

    /// Updates an existing user.
    async fn update_user(&self, user: &User) -> AccessResult<User>;

    /// Deletes a user and everything keyed by the user.
    async fn delete_user(&self, id: &str) -> AccessResult<()>;

    /// Creates a branch. Fails with a duplicate error if the id is taken.
    async fn create_branch(&self, branch: &Branch) -> AccessResult<Branch>;

    /// Gets a branch by ID.
    async fn get_branch(&self, id: &str) -> AccessResult<Option<Branch>>;

    /// Lists the branches of one gym, ordered by creation.
    async fn list_branches(&self, gym_id: &str) -> AccessResult<Vec<Branch>>;
}
