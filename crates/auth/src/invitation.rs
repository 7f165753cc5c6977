use crate::email::{templates, EmailMessage, MailDispatcher};
use crate::error::{AuthError, Result};
use crate::jwt::hash_token;
use crate::password::PasswordHasher;
use crate::service::{account_conflict, AuthService, AuthTokens, Principal, SessionMeta};
use chrono::{Duration, Utc};
use hirehub_authz::AuthzError;
use hirehub_database::{
    AccountRepository, Database, DatabaseError, InvitationRepository, MemberRepository,
    TenantRepository, UserRepository,
};
use hirehub_models::{AcceptInvitation, CreateInvitation, Invitation, NewUser, PlanTier, Role};
use rand::RngCore;
use uuid::Uuid;
use validator::Validate;

pub const INVITATION_TTL_DAYS: i64 = 7;

/// Page an invitee lands on from the emailed link
pub const ACCEPT_INVITATION_PATH: &str = "/invitations/accept";

/// Absolute link to the accept page for `token`. Tokens are hex, so they
/// need no escaping.
pub fn invitation_link(base_url: &str, token: &str) -> String {
    format!(
        "{}{}?token={}",
        base_url.trim_end_matches('/'),
        ACCEPT_INVITATION_PATH,
        token
    )
}

/// Random 256-bit token, hex encoded. Only its hash is stored.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Members plus outstanding invitations may not exceed the plan's seats
pub fn check_seat_limit(plan: PlanTier, members: i64, pending: i64) -> Result<()> {
    if let Some(limit) = plan.limits().team_seats {
        if members + pending >= i64::from(limit) {
            return Err(AuthError::SeatLimitReached {
                plan: plan.display_name().to_string(),
                limit,
            });
        }
    }
    Ok(())
}

/// Invitees join below the inviter and never as owner
pub fn check_invited_role(inviter: Role, role: Role) -> Result<()> {
    if role == Role::Owner {
        return Err(AuthzError::RoleAssignment("the owner role cannot be assigned".to_string()).into());
    }
    if !inviter.outranks(role) {
        return Err(AuthzError::RoleAssignment(format!("{} cannot invite a {}", inviter, role)).into());
    }
    Ok(())
}

#[derive(Clone)]
pub struct InvitationService {
    auth: AuthService,
    accounts: AccountRepository,
    invitations: InvitationRepository,
    members: MemberRepository,
    tenants: TenantRepository,
    users: UserRepository,
    mail: MailDispatcher,
    base_url: String,
}

impl InvitationService {
    pub fn new(db: &Database, auth: AuthService, mail: MailDispatcher, base_url: String) -> Self {
        let pool = db.pool().clone();

        Self {
            auth,
            accounts: AccountRepository::new(pool.clone()),
            invitations: InvitationRepository::new(pool.clone()),
            members: MemberRepository::new(pool.clone()),
            tenants: TenantRepository::new(pool.clone()),
            users: UserRepository::new(pool),
            mail,
            base_url,
        }
    }

    /// Invite someone into the inviter's company and email them the link
    pub async fn create(&self, inviter: &Principal, request: CreateInvitation) -> Result<Invitation> {
        request.validate()?;

        let tenant = self.tenants.find_by_id(inviter.tenant_id).await?;
        if !tenant.is_company() {
            return Err(AuthError::Forbidden("Only company accounts can invite members".to_string()));
        }

        check_invited_role(inviter.role, request.role)?;

        if self.users.email_exists(&request.email).await? {
            return Err(AuthError::EmailTaken);
        }
        if self.invitations.pending_exists(tenant.id, &request.email).await? {
            return Err(AuthError::Validation(format!(
                "An invitation for {} is already pending",
                request.email
            )));
        }

        let members = self.members.count(tenant.id).await?;
        let pending = self.invitations.count_pending(tenant.id).await?;
        check_seat_limit(inviter.plan, members, pending)?;

        let token = generate_token();
        let expires_at = Utc::now() + Duration::days(INVITATION_TTL_DAYS);

        let invitation = self
            .invitations
            .create(
                tenant.id,
                &request.email,
                request.role,
                &hash_token(&token),
                inviter.user_id,
                expires_at,
            )
            .await?;

        let inviter_user = self.users.find_by_id(inviter.user_id).await?;
        let link = invitation_link(&self.base_url, &token);
        let email = EmailMessage::from_template(
            &invitation.email,
            None,
            &format!("You've been invited to join {} on HireHub", tenant.name),
            templates::user_invitation(
                &inviter_user.full_name(),
                &tenant.name,
                &link,
                request.role.as_str(),
                &expires_at,
            ),
        );

        // The invitation is useless without its link, so a failed send is an error
        if let Err(e) = self.mail.send_for_tenant(tenant.id, inviter.plan, email).await {
            self.invitations.revoke(tenant.id, invitation.id).await?;
            return Err(e);
        }

        tracing::info!(
            tenant_id = %tenant.id,
            invitation_id = %invitation.id,
            role = %invitation.role,
            "Invitation sent"
        );

        Ok(invitation)
    }

    pub async fn list_pending(&self, tenant_id: Uuid) -> Result<Vec<Invitation>> {
        Ok(self.invitations.list_pending(tenant_id).await?)
    }

    pub async fn revoke(&self, tenant_id: Uuid, invitation_id: Uuid) -> Result<()> {
        self.invitations.revoke(tenant_id, invitation_id).await.map_err(|e| {
            if e.is_not_found() {
                AuthError::NotFound("Invitation not found".to_string())
            } else {
                e.into()
            }
        })?;

        tracing::info!(%tenant_id, %invitation_id, "Invitation revoked");
        Ok(())
    }

    /// Create the invitee's account and sign them in
    pub async fn accept(&self, request: AcceptInvitation, meta: SessionMeta) -> Result<AuthTokens> {
        request.validate()?;

        let invitation = self
            .invitations
            .find_by_token_hash(&hash_token(&request.token))
            .await
            .map_err(|_| AuthError::InvalidToken("Unknown invitation".to_string()))?;

        if invitation.accepted_at.is_some() {
            return Err(AuthError::InvalidToken("Invitation already accepted".to_string()));
        }
        if invitation.is_expired() {
            return Err(AuthError::TokenExpired);
        }
        if self.users.email_exists(&invitation.email).await? {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = PasswordHasher::hash(&request.password)?;
        let new_user = NewUser {
            tenant_id: invitation.tenant_id,
            email: invitation.email.clone(),
            first_name: request.first_name,
            last_name: request.last_name,
            phone: None,
        };

        let user = match self
            .accounts
            .join_tenant(invitation.id, &new_user, &password_hash, invitation.role)
            .await
        {
            Ok(user) => user,
            Err(DatabaseError::InvalidInput(msg)) => return Err(AuthError::InvalidToken(msg)),
            Err(e) => return Err(account_conflict(e)),
        };

        let subject = self.auth.token_subject(&user).await?;
        self.auth.start_session(&user, subject, meta).await
    }
}
