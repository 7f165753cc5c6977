pub mod engine;
pub mod error;
pub mod permission;

pub use engine::{can_assign_role, AccessContext, PermissionEngine};
pub use error::{AuthzError, Result};
pub use permission::{Action, Module, Permission};
