use crate::email::{templates, EmailMessage, MailDispatcher};
use crate::error::{AuthError, Result};
use crate::jwt::{hash_token, Claims, JwtService, TokenSubject};
use crate::password::PasswordHasher;
use crate::two_factor::{SecondFactorVerified, TwoFactorService};
use chrono::Utc;
use hirehub_database::{
    AccountRepository, Database, DatabaseError, MemberRepository, NewAccount, SessionRepository,
    SubscriptionRepository, TenantRepository, UserRepository, TENANT_SLUG_CONSTRAINT,
    USER_EMAIL_CONSTRAINT,
};
use hirehub_models::{
    slugify, ChangePassword, NewSession, NewTenant, PlanTier, Role, Session, Subscription, Tenant,
    TenantType, UpdateProfile, User, UserProfile,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterCandidateRequest {
    #[validate(email)]
    pub email: String,

    pub password: String,

    #[validate(length(min = 1, max = 100))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100))]
    pub last_name: String,

    #[validate(length(min = 5, max = 32))]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterCompanyRequest {
    #[validate(length(min = 1, max = 255))]
    pub company_name: String,

    #[validate(url)]
    pub website: Option<String>,

    #[validate(email)]
    pub email: String,

    pub password: String,

    #[validate(length(min = 1, max = 100))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoFactorLoginRequest {
    pub challenge_token: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Request metadata recorded on sessions
#[derive(Debug, Clone, Default)]
pub struct SessionMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserProfile,
    pub tenant_id: Uuid,
    pub tenant_type: TenantType,
    pub role: Role,
    pub plan: PlanTier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuthResponse {
    Success(AuthTokens),
    TwoFactorRequired {
        challenge_token: String,
        expires_in: i64,
    },
}

/// Identity behind a validated access token, with the live role and plan
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub tenant_id: Uuid,
    pub tenant_type: TenantType,
    pub role: Role,
    pub plan: PlanTier,
    pub session_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountOverview {
    pub user: UserProfile,
    pub tenant: Tenant,
    pub role: Role,
    pub subscription: Subscription,
    pub effective_plan: PlanTier,
}

#[derive(Clone)]
pub struct AuthService {
    pub jwt: JwtService,
    accounts: AccountRepository,
    users: UserRepository,
    tenants: TenantRepository,
    members: MemberRepository,
    sessions: SessionRepository,
    subscriptions: SubscriptionRepository,
    two_factor: TwoFactorService,
    mail: MailDispatcher,
    base_url: String,
}

impl AuthService {
    pub fn new(
        db: &Database,
        jwt: JwtService,
        two_factor: TwoFactorService,
        mail: MailDispatcher,
        base_url: String,
    ) -> Self {
        let pool = db.pool().clone();

        Self {
            jwt,
            accounts: AccountRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            tenants: TenantRepository::new(pool.clone()),
            members: MemberRepository::new(pool.clone()),
            sessions: SessionRepository::new(pool.clone()),
            subscriptions: SubscriptionRepository::new(pool),
            two_factor,
            mail,
            base_url,
        }
    }

    pub fn two_factor(&self) -> &TwoFactorService {
        &self.two_factor
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    pub async fn register_candidate(&self, request: RegisterCandidateRequest, meta: SessionMeta) -> Result<AuthTokens> {
        request.validate()?;

        let display_name = format!("{} {}", request.first_name.trim(), request.last_name.trim());
        let slug = self.tenants.available_slug(&slugify(&display_name)).await?;

        let account = NewAccount {
            tenant: NewTenant {
                tenant_type: TenantType::Candidate,
                name: display_name,
                slug,
                website: None,
            },
            email: request.email,
            password_hash: PasswordHasher::hash(&request.password)?,
            first_name: request.first_name,
            last_name: request.last_name,
            phone: request.phone,
        };

        self.open_account(account, meta).await
    }

    pub async fn register_company(&self, request: RegisterCompanyRequest, meta: SessionMeta) -> Result<AuthTokens> {
        request.validate()?;

        let slug = self.tenants.available_slug(&slugify(&request.company_name)).await?;

        let account = NewAccount {
            tenant: NewTenant {
                tenant_type: TenantType::Company,
                name: request.company_name.trim().to_string(),
                slug,
                website: request.website,
            },
            email: request.email,
            password_hash: PasswordHasher::hash(&request.password)?,
            first_name: request.first_name,
            last_name: request.last_name,
            phone: None,
        };

        self.open_account(account, meta).await
    }

    async fn open_account(&self, mut account: NewAccount, meta: SessionMeta) -> Result<AuthTokens> {
        account.tenant.validate()?;

        if self.users.email_exists(&account.email).await? {
            return Err(AuthError::EmailTaken);
        }

        let mut slug_retries = SLUG_RETRIES;
        let (tenant, user, subscription) = loop {
            match self.accounts.create_account(&account).await {
                Ok(created) => break created,
                // Another registration took the slug between lookup and insert
                Err(e) if slug_retries > 0 && e.violates(TENANT_SLUG_CONSTRAINT) => {
                    slug_retries -= 1;
                    account.tenant.slug = self.tenants.available_slug(&account.tenant.slug).await?;
                }
                Err(e) => return Err(account_conflict(e)),
            }
        };

        let plan = subscription.effective_plan();
        let email = EmailMessage::from_template(
            &user.email,
            Some(user.full_name()),
            "Welcome to HireHub",
            templates::welcome(&user.full_name(), &format!("{}/dashboard", self.base_url)),
        );
        self.mail.notify(tenant.id, plan, email).await;

        let subject = TokenSubject {
            user_id: user.id,
            email: user.email.clone(),
            tenant_id: tenant.id,
            tenant_type: tenant.tenant_type,
            role: Role::Owner,
            plan,
        };

        self.start_session(&user, subject, meta).await
    }

    // ------------------------------------------------------------------
    // Login
    // ------------------------------------------------------------------

    /// Password step. Users with two-factor enabled get a challenge token
    /// instead of a session.
    pub async fn login(&self, request: LoginRequest, meta: SessionMeta) -> Result<AuthResponse> {
        request.validate()?;

        let user = match self.users.find_by_email(&request.email).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => {
                // Same cost as a real check
                let _ = PasswordHasher::verify(&request.password, DUMMY_HASH);
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        if !PasswordHasher::verify(&request.password, &user.password_hash)? {
            tracing::info!(user_id = %user.id, "Failed login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AuthError::UserInactive);
        }

        let subject = self.token_subject(&user).await?;

        if user.two_factor_enabled {
            let challenge_token = self.jwt.generate_two_factor_challenge(&subject)?;
            return Ok(AuthResponse::TwoFactorRequired {
                challenge_token,
                expires_in: 300,
            });
        }

        let tokens = self.start_session(&user, subject, meta).await?;
        Ok(AuthResponse::Success(tokens))
    }

    /// Second step of a two-factor login
    pub async fn complete_two_factor_login(
        &self,
        request: TwoFactorLoginRequest,
        meta: SessionMeta,
    ) -> Result<(AuthTokens, SecondFactorVerified)> {
        let claims = self.jwt.validate_two_factor_challenge(&request.challenge_token)?;
        let user = self.users.find_by_id(claims.user_id()?).await?;

        if !user.is_active {
            return Err(AuthError::UserInactive);
        }

        let verified = self.two_factor.verify_login(&user, &request.code).await?;

        let subject = self.token_subject(&user).await?;
        let tokens = self.start_session(&user, subject, meta).await?;

        Ok((tokens, verified))
    }

    /// Exchange a refresh token for a new pair. The old session is removed.
    pub async fn refresh(&self, refresh_token: &str, meta: SessionMeta) -> Result<AuthTokens> {
        let claims = self.jwt.validate_refresh_token(refresh_token)?;

        let session = self
            .sessions
            .find_by_refresh_token(&hash_token(refresh_token))
            .await
            .map_err(|_| AuthError::InvalidToken("Session revoked".to_string()))?;

        let user = self.users.find_by_id(claims.user_id()?).await?;
        ensure_session_owner(&session, &user)?;

        // Rotation: the presented refresh token dies with its session
        self.sessions.delete(session.id).await?;

        let subject = self.token_subject(&user).await?;
        self.start_session(&user, subject, meta).await
    }

    pub async fn logout(&self, access_token: &str) -> Result<()> {
        self.sessions.delete_by_token(&hash_token(access_token)).await?;
        Ok(())
    }

    pub async fn logout_all(&self, user_id: Uuid) -> Result<u64> {
        let revoked = self.sessions.delete_all_user_sessions(user_id, None).await?;
        tracing::info!(%user_id, revoked, "All sessions revoked");
        Ok(revoked)
    }

    // ------------------------------------------------------------------
    // Authenticated requests
    // ------------------------------------------------------------------

    /// Validate an access token against its session and resolve the current
    /// role and plan, which may have changed since the token was issued.
    pub async fn authenticate(&self, access_token: &str) -> Result<Principal> {
        let claims: Claims = self.jwt.validate_access_token(access_token)?;

        let session = self
            .sessions
            .find_by_token(&hash_token(access_token))
            .await
            .map_err(|_| AuthError::InvalidToken("Session expired or revoked".to_string()))?;

        let user_id = claims.user_id()?;
        let tenant_id = claims.tenant_uuid()?;
        if session.user_id != user_id {
            return Err(AuthError::InvalidToken("Session mismatch".to_string()));
        }

        let member = self
            .members
            .find(tenant_id, user_id)
            .await
            .map_err(|_| AuthError::InvalidToken("Membership no longer exists".to_string()))?;
        let subscription = self.subscriptions.find_by_tenant(tenant_id).await?;

        Ok(Principal {
            user_id,
            email: claims.email,
            tenant_id,
            tenant_type: claims.tenant_type,
            role: member.role,
            plan: subscription.effective_plan(),
            session_id: session.id,
        })
    }

    pub async fn me(&self, user_id: Uuid) -> Result<AccountOverview> {
        let user = self.users.find_by_id(user_id).await?;
        let tenant = self.tenants.find_by_id(user.tenant_id).await?;
        let member = self.members.find(tenant.id, user.id).await?;
        let subscription = self.subscriptions.find_by_tenant(tenant.id).await?;

        Ok(AccountOverview {
            effective_plan: subscription.effective_plan(),
            user: user.into(),
            tenant,
            role: member.role,
            subscription,
        })
    }

    pub async fn load_user(&self, user_id: Uuid) -> Result<User> {
        self.users.find_by_id(user_id).await.map_err(|e| {
            if e.is_not_found() {
                AuthError::UserNotFound
            } else {
                e.into()
            }
        })
    }

    pub async fn update_profile(&self, user_id: Uuid, update: UpdateProfile) -> Result<UserProfile> {
        update.validate()?;
        let user = self.users.update_profile(user_id, &update).await?;
        Ok(user.into())
    }

    /// Change the password and revoke every other session of the user
    pub async fn change_password(&self, principal: &Principal, request: ChangePassword) -> Result<()> {
        request.validate()?;

        let user = self.users.find_by_id(principal.user_id).await?;
        if !PasswordHasher::verify(&request.current_password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let new_hash = PasswordHasher::hash(&request.new_password)?;
        self.users.update_password(user.id, &new_hash).await?;

        let revoked = self
            .sessions
            .delete_all_user_sessions(user.id, Some(principal.session_id))
            .await?;

        tracing::info!(user_id = %user.id, revoked, "Password changed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    pub(crate) async fn token_subject(&self, user: &User) -> Result<TokenSubject> {
        let tenant = self.tenants.find_by_id(user.tenant_id).await?;
        let member = self.members.find(tenant.id, user.id).await?;
        let subscription = self.subscriptions.find_by_tenant(tenant.id).await?;

        Ok(TokenSubject {
            user_id: user.id,
            email: user.email.clone(),
            tenant_id: tenant.id,
            tenant_type: tenant.tenant_type,
            role: member.role,
            plan: subscription.effective_plan(),
        })
    }

    /// Issue a token pair and persist its session
    pub(crate) async fn start_session(&self, user: &User, subject: TokenSubject, meta: SessionMeta) -> Result<AuthTokens> {
        let access_token = self.jwt.generate_access_token(&subject)?;
        let refresh_token = self.jwt.generate_refresh_token(&subject)?;

        self.sessions
            .create(&NewSession {
                user_id: user.id,
                token_hash: hash_token(&access_token),
                refresh_token_hash: hash_token(&refresh_token),
                ip_address: meta.ip_address,
                user_agent: meta.user_agent,
                expires_at: Utc::now() + self.jwt.refresh_token_ttl(),
            })
            .await?;

        self.users.update_last_login(user.id).await?;

        Ok(AuthTokens {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.access_token_ttl(),
            user: user.clone().into(),
            tenant_id: subject.tenant_id,
            tenant_type: subject.tenant_type,
            role: subject.role,
            plan: subject.plan,
        })
    }
}

// Argon2id hash of a random string, verified against when the email is unknown
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$2Q4ZnUtm8Vn0m3iPl9ZLxGQx3k0nEpyNbV6qJ1gU4Y8";

const SLUG_RETRIES: u8 = 1;

/// A session may only be continued by the active user it was issued to
fn ensure_session_owner(session: &Session, user: &User) -> Result<()> {
    if session.user_id != user.id {
        return Err(AuthError::InvalidToken("Session mismatch".to_string()));
    }
    if !user.is_active {
        return Err(AuthError::UserInactive);
    }
    Ok(())
}

/// Only the email index means the address is taken. Any other unique
/// violation stays a database conflict.
pub(crate) fn account_conflict(err: DatabaseError) -> AuthError {
    if err.violates(USER_EMAIL_CONSTRAINT) {
        AuthError::EmailTaken
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_conflict_distinguishes_email_from_slug() {
        assert!(matches!(
            account_conflict(DatabaseError::unique_violation(USER_EMAIL_CONSTRAINT)),
            AuthError::EmailTaken
        ));
        assert!(matches!(
            account_conflict(DatabaseError::unique_violation(TENANT_SLUG_CONSTRAINT)),
            AuthError::Database(DatabaseError::DuplicateEntry(_))
        ));
        assert!(matches!(
            account_conflict(DatabaseError::Other("down".to_string())),
            AuthError::Database(DatabaseError::Other(_))
        ));
    }

    #[test]
    fn test_auth_response_serialization() {
        let response = AuthResponse::TwoFactorRequired {
            challenge_token: "abc".to_string(),
            expires_in: 300,
        };
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["status"], "two_factor_required");
        assert_eq!(json["challenge_token"], "abc");
    }

    #[test]
    fn test_register_company_validation() {
        let request = RegisterCompanyRequest {
            company_name: String::new(),
            website: Some("not a url".to_string()),
            email: "jane@acme.io".to_string(),
            password: "ValidPassw0rd".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
        };

        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("company_name"));
        assert!(fields.contains_key("website"));
        assert!(!fields.contains_key("email"));
    }

    fn user(is_active: bool) -> User {
        User {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            email: "jane@acme.io".to_string(),
            email_verified: true,
            password_hash: String::new(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            phone: None,
            headline: None,
            location: None,
            is_active,
            two_factor_enabled: false,
            two_factor_secret: None,
            two_factor_pending_secret: None,
            two_factor_last_step: None,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn session_of(user_id: Uuid) -> Session {
        Session {
            id: Uuid::new_v4(),
            user_id,
            token_hash: "a".to_string(),
            refresh_token_hash: "r".to_string(),
            ip_address: None,
            user_agent: None,
            expires_at: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_session_continues_only_for_its_active_owner() {
        let owner = user(true);
        assert!(ensure_session_owner(&session_of(owner.id), &owner).is_ok());

        assert!(matches!(
            ensure_session_owner(&session_of(Uuid::new_v4()), &owner),
            Err(AuthError::InvalidToken(_))
        ));

        let inactive = user(false);
        assert!(matches!(
            ensure_session_owner(&session_of(inactive.id), &inactive),
            Err(AuthError::UserInactive)
        ));
    }

    mod with_database {
        use super::*;
        use crate::cipher::SecretCipher;
        use crate::email::{EmailLimitConfig, EmailLimitMonitor, Mailer, MemoryUsageStore};
        use async_trait::async_trait;
        use hirehub_database::DatabaseConfig;
        use std::sync::Arc;

        struct NullMailer;

        #[async_trait]
        impl Mailer for NullMailer {
            async fn send(&self, _email: EmailMessage) -> Result<()> {
                Ok(())
            }
        }

        async fn service() -> AuthService {
            let db = Database::new(DatabaseConfig::from_env()).await.unwrap();
            db.migrate().await.unwrap();

            let mail = MailDispatcher::new(
                Arc::new(NullMailer),
                EmailLimitMonitor::new(Arc::new(MemoryUsageStore::new()), EmailLimitConfig::default()),
            );
            let two_factor = TwoFactorService::new(&db, SecretCipher::new(&[7u8; 32]), "HireHub".to_string(), mail.clone());

            AuthService::new(
                &db,
                JwtService::new("test-secret", 15, 30),
                two_factor,
                mail,
                "http://localhost:8000".to_string(),
            )
        }

        async fn register(auth: &AuthService) -> AuthTokens {
            auth.register_candidate(
                RegisterCandidateRequest {
                    email: format!("{}@example.com", Uuid::new_v4().simple()),
                    password: "ValidPassw0rd".to_string(),
                    first_name: "Jane".to_string(),
                    last_name: "Doe".to_string(),
                    phone: None,
                },
                SessionMeta::default(),
            )
            .await
            .unwrap()
        }

        #[tokio::test]
        #[ignore] // Only run with database available
        async fn test_refresh_rotates_session() {
            let auth = service().await;
            let first = register(&auth).await;

            let second = auth.refresh(&first.refresh_token, SessionMeta::default()).await.unwrap();
            assert_ne!(second.refresh_token, first.refresh_token);

            // The old pair is gone, the new one works
            assert!(auth.refresh(&first.refresh_token, SessionMeta::default()).await.is_err());
            assert!(auth.authenticate(&first.access_token).await.is_err());
            assert!(auth.authenticate(&second.access_token).await.is_ok());

            auth.logout(&second.access_token).await.unwrap();
            assert!(auth.authenticate(&second.access_token).await.is_err());
        }

        #[tokio::test]
        #[ignore] // Only run with database available
        async fn test_change_password_revokes_other_sessions() {
            let auth = service().await;
            let current = register(&auth).await;
            let other = auth
                .login(
                    LoginRequest {
                        email: current.user.email.clone(),
                        password: "ValidPassw0rd".to_string(),
                    },
                    SessionMeta::default(),
                )
                .await
                .unwrap();
            let AuthResponse::Success(other) = other else {
                panic!("two-factor is not enabled");
            };

            let principal = auth.authenticate(&current.access_token).await.unwrap();
            auth.change_password(
                &principal,
                ChangePassword {
                    current_password: "ValidPassw0rd".to_string(),
                    new_password: "NewPassw0rd!".to_string(),
                },
            )
            .await
            .unwrap();

            assert!(auth.authenticate(&current.access_token).await.is_ok());
            assert!(auth.authenticate(&other.access_token).await.is_err());
            assert!(auth.refresh(&other.refresh_token, SessionMeta::default()).await.is_err());
        }
    }
}
