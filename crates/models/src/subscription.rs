use crate::plan::PlanTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// SUBSCRIPTION
// ============================================================================

/// Mirrors Stripe's subscription statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Incomplete,
    Unpaid,
}

impl SubscriptionStatus {
    /// Parse a Stripe status string. Statuses Stripe may add later fall
    /// back to `Incomplete` so they never grant access.
    pub fn from_stripe(status: &str) -> Self {
        match status {
            "active" => Self::Active,
            "trialing" => Self::Trialing,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            "unpaid" => Self::Unpaid,
            _ => Self::Incomplete,
        }
    }

    pub fn is_delinquent(&self) -> bool {
        matches!(self, Self::PastDue | Self::Unpaid)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Trialing => write!(f, "trialing"),
            Self::PastDue => write!(f, "past_due"),
            Self::Canceled => write!(f, "canceled"),
            Self::Incomplete => write!(f, "incomplete"),
            Self::Unpaid => write!(f, "unpaid"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    #[default]
    Monthly,
    Yearly,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub plan: PlanTier,
    pub status: SubscriptionStatus,
    pub billing_cycle: BillingCycle,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<DateTime<Utc>>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing
        )
    }

    pub fn has_stripe_subscription(&self) -> bool {
        self.stripe_subscription_id.is_some()
    }

    /// Plan whose limits and features currently apply. A delinquent or
    /// canceled paid subscription falls back to the free tier.
    pub fn effective_plan(&self) -> PlanTier {
        if self.plan.is_free() || self.is_active() {
            self.plan
        } else {
            PlanTier::default_for(self.plan.tenant_type())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubscription {
    pub tenant_id: Uuid,
    pub plan: PlanTier,
    pub stripe_customer_id: Option<String>,
}

/// Partial update; `None` leaves the column untouched. The doubly optional
/// fields distinguish "clear the column" from "leave it".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSubscription {
    pub plan: Option<PlanTier>,
    pub status: Option<SubscriptionStatus>,
    pub billing_cycle: Option<BillingCycle>,
    pub cancel_at_period_end: Option<bool>,
    pub canceled_at: Option<Option<DateTime<Utc>>>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<Option<String>>,
    pub current_period_start: Option<Option<DateTime<Utc>>>,
    pub current_period_end: Option<Option<DateTime<Utc>>>,
}

// ============================================================================
// BILLING EVENTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BillingEvent {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub event_type: String,
    pub stripe_event_id: String,
    pub data: serde_json::Value,
    pub processed_at: DateTime<Utc>,
}

// ============================================================================
// API SHAPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePlanRequest {
    pub plan: PlanTier,
    #[serde(default)]
    pub billing_cycle: BillingCycle,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChangePlanResponse {
    /// The customer must complete a Stripe Checkout session first.
    CheckoutRequired { checkout_url: String, session_id: String },
    Upgraded { subscription: Subscription },
    Downgraded { subscription: Subscription },
    /// Paid plan ends at period end and the tenant reverts to the free tier.
    ScheduledCancellation { subscription: Subscription },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionOverview {
    pub subscription: Subscription,
    pub effective_plan: PlanTier,
    pub plan: crate::plan::PlanInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription(plan: PlanTier, status: SubscriptionStatus) -> Subscription {
        Subscription {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            plan,
            status,
            billing_cycle: BillingCycle::Monthly,
            current_period_start: None,
            current_period_end: None,
            cancel_at_period_end: false,
            canceled_at: None,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_effective_plan_falls_back_when_delinquent() {
        let sub = subscription(PlanTier::Business, SubscriptionStatus::PastDue);
        assert_eq!(sub.effective_plan(), PlanTier::Startup);

        let sub = subscription(PlanTier::Pro, SubscriptionStatus::Active);
        assert_eq!(sub.effective_plan(), PlanTier::Pro);

        let sub = subscription(PlanTier::Free, SubscriptionStatus::Canceled);
        assert_eq!(sub.effective_plan(), PlanTier::Free);
    }

    #[test]
    fn test_status_from_stripe() {
        assert_eq!(SubscriptionStatus::from_stripe("past_due"), SubscriptionStatus::PastDue);
        assert_eq!(SubscriptionStatus::from_stripe("trialing"), SubscriptionStatus::Trialing);
        assert_eq!(
            SubscriptionStatus::from_stripe("incomplete_expired"),
            SubscriptionStatus::Incomplete
        );
    }
}
