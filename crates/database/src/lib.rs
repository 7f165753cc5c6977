pub mod connection;
pub mod error;
pub mod repositories;

pub use connection::{Database, DatabaseConfig};
pub use error::{DatabaseError, Result, TENANT_SLUG_CONSTRAINT, USER_EMAIL_CONSTRAINT};
pub use repositories::{
    accounts::{AccountRepository, NewAccount},
    backup_codes::BackupCodeRepository,
    billing_events::BillingEventRepository,
    invitations::InvitationRepository,
    members::MemberRepository,
    sessions::SessionRepository,
    subscriptions::SubscriptionRepository,
    tenants::TenantRepository,
    users::UserRepository,
};
