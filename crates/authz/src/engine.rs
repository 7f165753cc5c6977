use crate::error::{AuthzError, Result};
use crate::permission::{Action, Module, Permission};
use hirehub_models::{PlanTier, Role, TenantType};
use std::collections::{HashMap, HashSet};

/// The facts about a caller that permission decisions depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessContext {
    pub tenant_type: TenantType,
    pub role: Role,
    pub plan: PlanTier,
}

/// Static role × module × action matrix with tenant-type applicability and
/// plan feature gates.
#[derive(Debug, Clone)]
pub struct PermissionEngine {
    grants: HashMap<Role, HashSet<Permission>>,
}

impl Default for PermissionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionEngine {
    pub fn new() -> Self {
        let grants = Role::ALL
            .into_iter()
            .map(|role| (role, role_grants(role)))
            .collect();

        Self { grants }
    }

    /// Check a single permission. Applicability is evaluated first, then the
    /// role matrix, then the plan gate; the first failure is returned.
    pub fn check(&self, ctx: &AccessContext, module: Module, action: Action) -> Result<()> {
        if !module_applies(ctx.tenant_type, module) {
            return Err(AuthzError::ModuleUnavailable {
                module,
                tenant_type: ctx.tenant_type,
            });
        }

        let granted = self
            .grants
            .get(&ctx.role)
            .is_some_and(|set| set.contains(&Permission::new(module, action)));

        if !granted {
            tracing::debug!(role = %ctx.role, %module, %action, "Permission denied by role");
            return Err(AuthzError::Forbidden {
                role: ctx.role,
                module,
                action,
            });
        }

        if !plan_allows(ctx.plan, module) {
            return Err(AuthzError::PlanUpgradeRequired {
                module,
                plan: ctx.plan,
            });
        }

        Ok(())
    }

    pub fn is_allowed(&self, ctx: &AccessContext, module: Module, action: Action) -> bool {
        self.check(ctx, module, action).is_ok()
    }

    /// Every permission the caller effectively holds, sorted for display
    pub fn effective_permissions(&self, ctx: &AccessContext) -> Vec<Permission> {
        let mut permissions: Vec<Permission> = Module::ALL
            .into_iter()
            .flat_map(|module| Action::ALL.into_iter().map(move |action| Permission::new(module, action)))
            .filter(|p| self.is_allowed(ctx, p.module, p.action))
            .collect();

        permissions.sort_by_key(|p| (p.module as u8, p.action as u8));
        permissions
    }
}

fn role_grants(role: Role) -> HashSet<Permission> {
    use Action::*;
    use Module::*;

    let mut set = HashSet::new();
    let mut grant = |modules: &[Module], actions: &[Action]| {
        for &module in modules {
            for &action in actions {
                set.insert(Permission::new(module, action));
            }
        }
    };

    match role {
        Role::Owner => grant(&Module::ALL, &Action::ALL),
        Role::Admin => {
            grant(
                &[Jobs, Applications, Candidates, Team, Settings, Analytics],
                &Action::ALL,
            );
            grant(&[Billing], &[Read, Write]);
        }
        Role::Manager => {
            grant(&[Jobs, Applications, Candidates], &[Read, Write, Delete]);
            grant(&[Team, Settings, Analytics], &[Read]);
        }
        Role::Member => {
            grant(&[Jobs, Applications, Candidates], &[Read, Write]);
            grant(&[Team, Analytics], &[Read]);
        }
        Role::Viewer => grant(&[Jobs, Applications, Candidates, Analytics], &[Read]),
    }

    set
}

fn module_applies(tenant_type: TenantType, module: Module) -> bool {
    match tenant_type {
        TenantType::Company => true,
        TenantType::Candidate => matches!(
            module,
            Module::Applications | Module::Billing | Module::Settings
        ),
    }
}

fn plan_allows(plan: PlanTier, module: Module) -> bool {
    match module {
        Module::Analytics => plan.features().analytics,
        _ => true,
    }
}

/// Whether `actor` may move a member from `current` to `target`. The actor
/// must be an admin or owner and outrank both roles. Ownership never
/// changes hands this way.
pub fn can_assign_role(actor: Role, current: Role, target: Role) -> Result<()> {
    if current == Role::Owner || target == Role::Owner {
        return Err(AuthzError::RoleAssignment(
            "the owner role cannot be assigned or removed".to_string(),
        ));
    }

    if !matches!(actor, Role::Owner | Role::Admin) {
        return Err(AuthzError::RoleAssignment(
            "only owners and admins can change roles".to_string(),
        ));
    }

    if !actor.outranks(current) || !actor.outranks(target) {
        return Err(AuthzError::RoleAssignment(format!(
            "{} cannot change a {} to {}",
            actor, current, target
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company(role: Role, plan: PlanTier) -> AccessContext {
        AccessContext {
            tenant_type: TenantType::Company,
            role,
            plan,
        }
    }

    #[test]
    fn test_owner_has_everything_on_company_tenant() {
        let engine = PermissionEngine::new();
        let ctx = company(Role::Owner, PlanTier::Enterprise);

        for module in Module::ALL {
            for action in Action::ALL {
                assert!(engine.is_allowed(&ctx, module, action), "{}:{}", module, action);
            }
        }
    }

    #[test]
    fn test_admin_cannot_manage_or_delete_billing() {
        let engine = PermissionEngine::new();
        let ctx = company(Role::Admin, PlanTier::Business);

        assert!(engine.is_allowed(&ctx, Module::Billing, Action::Read));
        assert!(engine.is_allowed(&ctx, Module::Billing, Action::Write));
        assert!(engine.is_allowed(&ctx, Module::Team, Action::Manage));
        assert_eq!(
            engine.check(&ctx, Module::Billing, Action::Manage),
            Err(AuthzError::Forbidden {
                role: Role::Admin,
                module: Module::Billing,
                action: Action::Manage,
            })
        );
        assert!(!engine.is_allowed(&ctx, Module::Billing, Action::Delete));
    }

    #[test]
    fn test_manager_member_viewer_matrix() {
        let engine = PermissionEngine::new();

        let manager = company(Role::Manager, PlanTier::Business);
        assert!(engine.is_allowed(&manager, Module::Jobs, Action::Delete));
        assert!(engine.is_allowed(&manager, Module::Settings, Action::Read));
        assert!(!engine.is_allowed(&manager, Module::Settings, Action::Write));
        assert!(!engine.is_allowed(&manager, Module::Team, Action::Manage));
        assert!(!engine.is_allowed(&manager, Module::Billing, Action::Read));

        let member = company(Role::Member, PlanTier::Business);
        assert!(engine.is_allowed(&member, Module::Candidates, Action::Write));
        assert!(!engine.is_allowed(&member, Module::Candidates, Action::Delete));
        assert!(engine.is_allowed(&member, Module::Team, Action::Read));
        assert!(!engine.is_allowed(&member, Module::Settings, Action::Read));

        let viewer = company(Role::Viewer, PlanTier::Business);
        assert!(engine.is_allowed(&viewer, Module::Applications, Action::Read));
        assert!(!engine.is_allowed(&viewer, Module::Applications, Action::Write));
        assert!(!engine.is_allowed(&viewer, Module::Team, Action::Read));
    }

    #[test]
    fn test_candidate_tenant_module_applicability() {
        let engine = PermissionEngine::new();
        let ctx = AccessContext {
            tenant_type: TenantType::Candidate,
            role: Role::Owner,
            plan: PlanTier::Premium,
        };

        assert!(engine.is_allowed(&ctx, Module::Applications, Action::Write));
        assert!(engine.is_allowed(&ctx, Module::Billing, Action::Manage));
        assert!(engine.is_allowed(&ctx, Module::Settings, Action::Write));
        assert!(matches!(
            engine.check(&ctx, Module::Jobs, Action::Read),
            Err(AuthzError::ModuleUnavailable { .. })
        ));
        assert!(!engine.is_allowed(&ctx, Module::Team, Action::Read));
        assert!(!engine.is_allowed(&ctx, Module::Analytics, Action::Read));
    }

    #[test]
    fn test_analytics_plan_gate() {
        let engine = PermissionEngine::new();

        let startup = company(Role::Owner, PlanTier::Startup);
        assert_eq!(
            engine.check(&startup, Module::Analytics, Action::Read),
            Err(AuthzError::PlanUpgradeRequired {
                module: Module::Analytics,
                plan: PlanTier::Startup,
            })
        );

        let business = company(Role::Viewer, PlanTier::Business);
        assert!(engine.is_allowed(&business, Module::Analytics, Action::Read));
    }

    #[test]
    fn test_role_failure_reported_before_plan_gate() {
        let engine = PermissionEngine::new();
        let ctx = company(Role::Viewer, PlanTier::Startup);

        assert!(matches!(
            engine.check(&ctx, Module::Analytics, Action::Write),
            Err(AuthzError::Forbidden { .. })
        ));
    }

    #[test]
    fn test_effective_permissions_for_viewer() {
        let engine = PermissionEngine::new();
        let ctx = company(Role::Viewer, PlanTier::Startup);
        let rendered: Vec<String> = engine
            .effective_permissions(&ctx)
            .iter()
            .map(|p| p.to_string())
            .collect();

        assert_eq!(
            rendered,
            vec!["jobs:read", "applications:read", "candidates:read"]
        );
    }

    #[test]
    fn test_can_assign_role() {
        assert!(can_assign_role(Role::Owner, Role::Member, Role::Admin).is_ok());
        assert!(can_assign_role(Role::Admin, Role::Viewer, Role::Manager).is_ok());

        // Admin cannot promote to admin (must strictly outrank target)
        assert!(can_assign_role(Role::Admin, Role::Member, Role::Admin).is_err());
        // Admin cannot demote another admin
        assert!(can_assign_role(Role::Admin, Role::Admin, Role::Viewer).is_err());
        // Managers never assign roles
        assert!(can_assign_role(Role::Manager, Role::Viewer, Role::Member).is_err());
        // Owner role is untouchable
        assert!(can_assign_role(Role::Owner, Role::Admin, Role::Owner).is_err());
        assert!(can_assign_role(Role::Owner, Role::Owner, Role::Admin).is_err());
    }
}
