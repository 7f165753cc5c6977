use crate::error::{BillingError, Result};
use hirehub_models::{PlanTier, Subscription, SubscriptionStatus};
use serde::Serialize;

/// What a subscription currently looks like, as far as plan changes care
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionState {
    pub tier: PlanTier,
    pub status: SubscriptionStatus,
    pub cancel_at_period_end: bool,
    pub has_stripe_subscription: bool,
}

impl From<&Subscription> for SubscriptionState {
    fn from(sub: &Subscription) -> Self {
        Self {
            tier: sub.plan,
            status: sub.status,
            cancel_at_period_end: sub.cancel_at_period_end,
            has_stripe_subscription: sub.has_stripe_subscription(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTransition {
    NoChange,
    /// Start a paid subscription through Stripe Checkout
    Checkout,
    /// Move to a higher paid tier, prorated immediately
    Upgrade,
    /// Move to a lower paid tier, new price from the next cycle
    Downgrade,
    /// Cancel the paid subscription at period end and fall back to the free tier
    CancelToFree,
}

/// Decide how to get from the current subscription to `target`
pub fn plan_transition(current: SubscriptionState, target: PlanTier) -> Result<PlanTransition> {
    if target.tenant_type() != current.tier.tenant_type() {
        return Err(BillingError::InvalidPlan(format!(
            "{} is not available for {} accounts",
            target.display_name(),
            current.tier.tenant_type()
        )));
    }

    if target == current.tier {
        return Ok(PlanTransition::NoChange);
    }

    let paid = !current.tier.is_free() && current.has_stripe_subscription;

    if !paid {
        if target.is_free() {
            return Ok(PlanTransition::NoChange);
        }
        return Ok(PlanTransition::Checkout);
    }

    if target.is_free() {
        if current.cancel_at_period_end {
            return Err(BillingError::InvalidState(
                "Subscription is already scheduled to end".to_string(),
            ));
        }
        return Ok(PlanTransition::CancelToFree);
    }

    if current.status.is_delinquent() {
        return Err(BillingError::PaymentRequired(
            "Settle the outstanding invoice before changing plans".to_string(),
        ));
    }

    if target.rank() > current.tier.rank() {
        Ok(PlanTransition::Upgrade)
    } else {
        Ok(PlanTransition::Downgrade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paid(tier: PlanTier, status: SubscriptionStatus) -> SubscriptionState {
        SubscriptionState {
            tier,
            status,
            cancel_at_period_end: false,
            has_stripe_subscription: true,
        }
    }

    fn free(tier: PlanTier) -> SubscriptionState {
        SubscriptionState {
            tier,
            status: SubscriptionStatus::Active,
            cancel_at_period_end: false,
            has_stripe_subscription: false,
        }
    }

    #[test]
    fn test_free_to_paid_goes_through_checkout() {
        assert_eq!(plan_transition(free(PlanTier::Free), PlanTier::Premium).unwrap(), PlanTransition::Checkout);
        assert_eq!(plan_transition(free(PlanTier::Startup), PlanTier::Business).unwrap(), PlanTransition::Checkout);
    }

    #[test]
    fn test_paid_changes() {
        let pro = paid(PlanTier::Pro, SubscriptionStatus::Active);
        assert_eq!(plan_transition(pro, PlanTier::Premium).unwrap(), PlanTransition::Upgrade);
        assert_eq!(plan_transition(pro, PlanTier::Free).unwrap(), PlanTransition::CancelToFree);
        assert_eq!(plan_transition(pro, PlanTier::Pro).unwrap(), PlanTransition::NoChange);

        let enterprise = paid(PlanTier::Enterprise, SubscriptionStatus::Trialing);
        assert_eq!(plan_transition(enterprise, PlanTier::Business).unwrap(), PlanTransition::Downgrade);
    }

    #[test]
    fn test_cross_tenant_type_is_rejected() {
        assert!(matches!(
            plan_transition(free(PlanTier::Free), PlanTier::Business),
            Err(BillingError::InvalidPlan(_))
        ));
        assert!(matches!(
            plan_transition(paid(PlanTier::Business, SubscriptionStatus::Active), PlanTier::Pro),
            Err(BillingError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_delinquent_can_only_cancel() {
        let past_due = paid(PlanTier::Business, SubscriptionStatus::PastDue);

        assert!(matches!(
            plan_transition(past_due, PlanTier::Enterprise),
            Err(BillingError::PaymentRequired(_))
        ));
        assert!(matches!(
            plan_transition(past_due, PlanTier::Startup),
            Ok(PlanTransition::CancelToFree)
        ));

        let unpaid = paid(PlanTier::Pro, SubscriptionStatus::Unpaid);
        assert!(plan_transition(unpaid, PlanTier::Premium).is_err());
    }

    #[test]
    fn test_cancel_twice_is_rejected() {
        let mut state = paid(PlanTier::Premium, SubscriptionStatus::Active);
        state.cancel_at_period_end = true;

        assert!(matches!(
            plan_transition(state, PlanTier::Free),
            Err(BillingError::InvalidState(_))
        ));
        // Changing to another paid tier lifts the scheduled cancellation
        assert_eq!(plan_transition(state, PlanTier::Pro).unwrap(), PlanTransition::Downgrade);
    }

    #[test]
    fn test_paid_tier_without_stripe_subscription_needs_checkout() {
        let state = SubscriptionState {
            tier: PlanTier::Pro,
            status: SubscriptionStatus::Canceled,
            cancel_at_period_end: false,
            has_stripe_subscription: false,
        };
        assert_eq!(plan_transition(state, PlanTier::Premium).unwrap(), PlanTransition::Checkout);
    }
}
