use crate::error::{BillingError, Result};
use hirehub_models::{BillingCycle, PlanTier};
use std::collections::HashMap;

/// Maps paid tiers and billing cycles to Stripe price ids
#[derive(Debug, Clone, Default)]
pub struct PriceCatalog {
    prices: HashMap<(PlanTier, BillingCycle), String>,
}

impl PriceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, tier: PlanTier, cycle: BillingCycle, price_id: impl Into<String>) -> Self {
        self.prices.insert((tier, cycle), price_id.into());
        self
    }

    /// Read `STRIPE_PRICE_<TIER>_<CYCLE>` for every paid tier, e.g.
    /// `STRIPE_PRICE_BUSINESS_YEARLY`. Missing entries are left out and
    /// only fail when that combination is requested.
    pub fn from_env() -> Self {
        let mut catalog = Self::new();

        for tier in PlanTier::ALL.into_iter().filter(|t| !t.is_free()) {
            for cycle in [BillingCycle::Monthly, BillingCycle::Yearly] {
                let var = Self::env_var(tier, cycle);
                match std::env::var(&var) {
                    Ok(price_id) if !price_id.is_empty() => {
                        catalog.prices.insert((tier, cycle), price_id);
                    }
                    _ => tracing::debug!(%var, "Stripe price not configured"),
                }
            }
        }

        catalog
    }

    pub fn env_var(tier: PlanTier, cycle: BillingCycle) -> String {
        format!(
            "STRIPE_PRICE_{}_{}",
            tier.as_str().to_uppercase(),
            cycle.as_str().to_uppercase()
        )
    }

    pub fn price_for(&self, tier: PlanTier, cycle: BillingCycle) -> Result<&str> {
        if tier.is_free() {
            return Err(BillingError::InvalidPlan(format!(
                "{} is free and has no price",
                tier.display_name()
            )));
        }

        self.prices
            .get(&(tier, cycle))
            .map(String::as_str)
            .ok_or_else(|| {
                BillingError::Configuration(format!(
                    "{} is not configured",
                    Self::env_var(tier, cycle)
                ))
            })
    }

    /// Reverse lookup used when Stripe reports a subscription's price
    pub fn lookup(&self, price_id: &str) -> Option<(PlanTier, BillingCycle)> {
        self.prices
            .iter()
            .find(|(_, id)| id.as_str() == price_id)
            .map(|(key, _)| *key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> PriceCatalog {
        PriceCatalog::new()
            .with_price(PlanTier::Pro, BillingCycle::Monthly, "price_pro_m")
            .with_price(PlanTier::Business, BillingCycle::Yearly, "price_biz_y")
    }

    #[test]
    fn test_env_var_name() {
        assert_eq!(
            PriceCatalog::env_var(PlanTier::Business, BillingCycle::Yearly),
            "STRIPE_PRICE_BUSINESS_YEARLY"
        );
    }

    #[test]
    fn test_price_lookup_both_ways() {
        let catalog = catalog();

        assert_eq!(catalog.price_for(PlanTier::Pro, BillingCycle::Monthly).unwrap(), "price_pro_m");
        assert_eq!(
            catalog.lookup("price_biz_y"),
            Some((PlanTier::Business, BillingCycle::Yearly))
        );
        assert_eq!(catalog.lookup("price_unknown"), None);
    }

    #[test]
    fn test_missing_and_free_prices() {
        let catalog = catalog();

        assert!(matches!(
            catalog.price_for(PlanTier::Pro, BillingCycle::Yearly),
            Err(BillingError::Configuration(_))
        ));
        assert!(matches!(
            catalog.price_for(PlanTier::Free, BillingCycle::Monthly),
            Err(BillingError::InvalidPlan(_))
        ));
    }
}
