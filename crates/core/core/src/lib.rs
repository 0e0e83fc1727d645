//! # Gym Access Core
//!
//! This crate provides the foundational types and traits for gym access
//! control. It defines the `User` profile, the `PrimaryRole` and `RoleScope`
//! classifications, the error type, and the storage interface adapters must
//! implement.

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at the crate root
pub use error::{AccessError, AccessResult};
pub use traits::{StorageAdapter, UserExtension};
pub use types::{Branch, PrimaryRole, RoleScope, User};
