use hirehub_models::{PlanTier, Role, TenantType};
use thiserror::Error;

use crate::permission::{Action, Module};

pub type Result<T> = std::result::Result<T, AuthzError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    #[error("The {module} module is not available to {tenant_type} accounts")]
    ModuleUnavailable { module: Module, tenant_type: TenantType },

    #[error("Role {role} may not {action} {module}")]
    Forbidden {
        role: Role,
        module: Module,
        action: Action,
    },

    #[error("The {module} module requires a higher plan than {plan}")]
    PlanUpgradeRequired { module: Module, plan: PlanTier },

    #[error("Role change not allowed: {0}")]
    RoleAssignment(String),
}

impl AuthzError {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::ModuleUnavailable { .. } => "module_unavailable",
            Self::Forbidden { .. } => "forbidden",
            Self::PlanUpgradeRequired { .. } => "plan_upgrade_required",
            Self::RoleAssignment(_) => "role_assignment_denied",
        }
    }
}
