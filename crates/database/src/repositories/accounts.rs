use crate::error::{DatabaseError, Result};
use crate::repositories::{
    invitations::InvitationRepository, members::MemberRepository,
    subscriptions::SubscriptionRepository, tenants::TenantRepository, users::UserRepository,
};
use hirehub_models::{NewSubscription, NewTenant, NewUser, PlanTier, Role, Subscription, Tenant, User};
use sqlx::PgPool;
use uuid::Uuid;

/// Everything needed to open a new tenant with its first user
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub tenant: NewTenant,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

/// Multi-table writes that must succeed or fail as a whole
#[derive(Clone)]
pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tenant, owner, owner membership and the default subscription
    /// in one transaction.
    pub async fn create_account(&self, account: &NewAccount) -> Result<(Tenant, User, Subscription)> {
        let mut tx = self.pool.begin().await?;

        let tenant = TenantRepository::insert(&mut tx, &account.tenant).await?;

        let new_user = NewUser {
            tenant_id: tenant.id,
            email: account.email.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            phone: account.phone.clone(),
        };
        let user = UserRepository::insert(&mut tx, &new_user, &account.password_hash).await?;
        MemberRepository::add(&mut tx, tenant.id, user.id, Role::Owner).await?;

        let subscription = SubscriptionRepository::insert(
            &mut tx,
            &NewSubscription {
                tenant_id: tenant.id,
                plan: PlanTier::default_for(tenant.tenant_type),
                stripe_customer_id: None,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(tenant_id = %tenant.id, user_id = %user.id, "Account created");
        Ok((tenant, user, subscription))
    }

    /// Create a user inside an existing tenant and consume the invitation
    /// that brought them in.
    pub async fn join_tenant(
        &self,
        invitation_id: Uuid,
        new_user: &NewUser,
        password_hash: &str,
        role: Role,
    ) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        if !InvitationRepository::mark_accepted(&mut tx, invitation_id).await? {
            return Err(DatabaseError::InvalidInput(
                "Invitation already accepted".to_string(),
            ));
        }

        let user = UserRepository::insert(&mut tx, new_user, password_hash).await?;
        MemberRepository::add(&mut tx, new_user.tenant_id, user.id, role).await?;

        tx.commit().await?;

        tracing::info!(tenant_id = %new_user.tenant_id, user_id = %user.id, "Invitation accepted");
        Ok(user)
    }
}
