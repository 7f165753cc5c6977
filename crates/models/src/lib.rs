pub mod email_usage;
pub mod invitation;
pub mod plan;
pub mod role;
pub mod session;
pub mod subscription;
pub mod tenant;
pub mod two_factor;
pub mod user;

// Re-export commonly used types
pub use email_usage::{EmailUsageSnapshot, UsageCounter, UsageLevel};
pub use invitation::{AcceptInvitation, CreateInvitation, Invitation};
pub use plan::{PlanFeatures, PlanInfo, PlanLimits, PlanTier};
pub use role::{Role, TenantMember, TenantMemberWithUser, UpdateMemberRole};
pub use session::{NewSession, Session};
pub use subscription::{
    BillingCycle, BillingEvent, ChangePlanRequest, ChangePlanResponse, NewSubscription,
    Subscription, SubscriptionOverview, SubscriptionStatus, UpdateSubscription,
};
pub use tenant::{slugify, NewTenant, Tenant, TenantType, UpdateTenant};
pub use two_factor::{BackupCode, BackupCodesResponse, SecondFactor, TwoFactorSetup, TwoFactorStatus};
pub use user::{ChangePassword, NewUser, UpdateProfile, User, UserProfile};
