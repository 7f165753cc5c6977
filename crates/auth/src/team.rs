use crate::error::{AuthError, Result};
use crate::service::Principal;
use hirehub_authz::{can_assign_role, AuthzError};
use hirehub_database::{Database, MemberRepository, SessionRepository};
use hirehub_models::{Role, TenantMember, TenantMemberWithUser};
use uuid::Uuid;

#[derive(Clone)]
pub struct TeamService {
    members: MemberRepository,
    sessions: SessionRepository,
}

impl TeamService {
    pub fn new(db: &Database) -> Self {
        let pool = db.pool().clone();
        Self {
            members: MemberRepository::new(pool.clone()),
            sessions: SessionRepository::new(pool),
        }
    }

    pub async fn list(&self, tenant_id: Uuid) -> Result<Vec<TenantMemberWithUser>> {
        Ok(self.members.list_with_users(tenant_id).await?)
    }

    pub async fn change_role(&self, actor: &Principal, user_id: Uuid, role: Role) -> Result<TenantMember> {
        if actor.user_id == user_id {
            return Err(AuthzError::RoleAssignment("you cannot change your own role".to_string()).into());
        }

        let member = self.find_member(actor.tenant_id, user_id).await?;
        can_assign_role(actor.role, member.role, role)?;

        let updated = self.members.update_role(actor.tenant_id, user_id, role).await?;

        tracing::info!(
            tenant_id = %actor.tenant_id,
            %user_id,
            from = %member.role,
            to = %role,
            "Member role changed"
        );

        Ok(updated)
    }

    /// Remove a member from the tenant. Their account and sessions go with it.
    pub async fn remove(&self, actor: &Principal, user_id: Uuid) -> Result<()> {
        if actor.user_id == user_id {
            return Err(AuthError::Forbidden("You cannot remove yourself".to_string()));
        }

        let member = self.find_member(actor.tenant_id, user_id).await?;
        if member.role == Role::Owner {
            return Err(AuthzError::RoleAssignment("the owner cannot be removed".to_string()).into());
        }
        if !actor.role.outranks(member.role) {
            return Err(AuthError::Forbidden(format!(
                "A {} cannot remove a {}",
                actor.role, member.role
            )));
        }

        self.sessions.delete_all_user_sessions(user_id, None).await?;
        self.members.remove(actor.tenant_id, user_id).await?;

        tracing::info!(tenant_id = %actor.tenant_id, %user_id, "Member removed");
        Ok(())
    }

    async fn find_member(&self, tenant_id: Uuid, user_id: Uuid) -> Result<TenantMember> {
        self.members.find(tenant_id, user_id).await.map_err(|e| {
            if e.is_not_found() {
                AuthError::NotFound("Member not found".to_string())
            } else {
                e.into()
            }
        })
    }
}
