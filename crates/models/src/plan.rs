use crate::tenant::TenantType;
use serde::{Deserialize, Serialize};

/// Subscription tier. Each tier belongs to exactly one tenant type and the
/// lowest tier of each type is free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    // Candidate plans
    Free,
    Pro,
    Premium,
    // Company plans
    Startup,
    Business,
    Enterprise,
}

/// Usage quotas. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub job_postings: Option<u32>,
    pub team_seats: Option<u32>,
    pub applications_per_month: Option<u32>,
    pub emails_per_month: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanFeatures {
    pub analytics: bool,
    pub ai_matching: bool,
    pub priority_listing: bool,
    pub ats_integration: bool,
    pub api_access: bool,
    pub custom_branding: bool,
    pub sso: bool,
}

/// Public plan description returned by the catalog endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanInfo {
    pub tier: PlanTier,
    pub name: String,
    pub tenant_type: TenantType,
    pub monthly_price_cents: u32,
    pub yearly_price_cents: u32,
    pub limits: PlanLimits,
    pub features: PlanFeatures,
}

impl PlanTier {
    pub const ALL: [PlanTier; 6] = [
        PlanTier::Free,
        PlanTier::Pro,
        PlanTier::Premium,
        PlanTier::Startup,
        PlanTier::Business,
        PlanTier::Enterprise,
    ];

    pub fn tenant_type(&self) -> TenantType {
        match self {
            Self::Free | Self::Pro | Self::Premium => TenantType::Candidate,
            Self::Startup | Self::Business | Self::Enterprise => TenantType::Company,
        }
    }

    /// Position within the tenant type's ladder, starting at 0 for the free tier.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Free | Self::Startup => 0,
            Self::Pro | Self::Business => 1,
            Self::Premium | Self::Enterprise => 2,
        }
    }

    pub fn default_for(tenant_type: TenantType) -> Self {
        match tenant_type {
            TenantType::Candidate => Self::Free,
            TenantType::Company => Self::Startup,
        }
    }

    pub fn for_tenant_type(tenant_type: TenantType) -> Vec<PlanTier> {
        Self::ALL
            .into_iter()
            .filter(|t| t.tenant_type() == tenant_type)
            .collect()
    }

    pub fn is_free(&self) -> bool {
        self.rank() == 0
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Pro => "Pro",
            Self::Premium => "Premium",
            Self::Startup => "Startup",
            Self::Business => "Business",
            Self::Enterprise => "Enterprise",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Premium => "premium",
            Self::Startup => "startup",
            Self::Business => "business",
            Self::Enterprise => "enterprise",
        }
    }

    pub fn monthly_price_cents(&self) -> u32 {
        match self {
            Self::Free | Self::Startup => 0,
            Self::Pro => 1_900,
            Self::Premium => 3_900,
            Self::Business => 29_900,
            Self::Enterprise => 99_900,
        }
    }

    /// Yearly billing is ten months' price.
    pub fn yearly_price_cents(&self) -> u32 {
        self.monthly_price_cents() * 10
    }

    pub fn limits(&self) -> PlanLimits {
        match self {
            Self::Free => PlanLimits {
                job_postings: Some(0),
                team_seats: Some(1),
                applications_per_month: Some(10),
                emails_per_month: Some(50),
            },
            Self::Pro => PlanLimits {
                job_postings: Some(0),
                team_seats: Some(1),
                applications_per_month: Some(100),
                emails_per_month: Some(500),
            },
            Self::Premium => PlanLimits {
                job_postings: Some(0),
                team_seats: Some(1),
                applications_per_month: None,
                emails_per_month: Some(2_000),
            },
            Self::Startup => PlanLimits {
                job_postings: Some(3),
                team_seats: Some(3),
                applications_per_month: None,
                emails_per_month: Some(500),
            },
            Self::Business => PlanLimits {
                job_postings: Some(25),
                team_seats: Some(15),
                applications_per_month: None,
                emails_per_month: Some(5_000),
            },
            Self::Enterprise => PlanLimits {
                job_postings: None,
                team_seats: None,
                applications_per_month: None,
                emails_per_month: Some(50_000),
            },
        }
    }

    pub fn features(&self) -> PlanFeatures {
        match self {
            Self::Free | Self::Startup => PlanFeatures::default(),
            Self::Pro => PlanFeatures {
                ai_matching: true,
                ..PlanFeatures::default()
            },
            Self::Premium => PlanFeatures {
                analytics: true,
                ai_matching: true,
                priority_listing: true,
                ..PlanFeatures::default()
            },
            Self::Business => PlanFeatures {
                analytics: true,
                ats_integration: true,
                custom_branding: true,
                ..PlanFeatures::default()
            },
            Self::Enterprise => PlanFeatures {
                analytics: true,
                ai_matching: true,
                ats_integration: true,
                api_access: true,
                custom_branding: true,
                sso: true,
                ..PlanFeatures::default()
            },
        }
    }

    pub fn info(&self) -> PlanInfo {
        PlanInfo {
            tier: *self,
            name: self.display_name().to_string(),
            tenant_type: self.tenant_type(),
            monthly_price_cents: self.monthly_price_cents(),
            yearly_price_cents: self.yearly_price_cents(),
            limits: self.limits(),
            features: self.features(),
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlanTier::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown plan: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_tenant_type_has_one_free_default() {
        for tenant_type in [TenantType::Candidate, TenantType::Company] {
            let default = PlanTier::default_for(tenant_type);
            assert!(default.is_free());
            assert_eq!(default.tenant_type(), tenant_type);

            let free: Vec<_> = PlanTier::for_tenant_type(tenant_type)
                .into_iter()
                .filter(|t| t.is_free())
                .collect();
            assert_eq!(free, vec![default]);
        }
    }

    #[test]
    fn test_prices_increase_with_rank() {
        for tenant_type in [TenantType::Candidate, TenantType::Company] {
            let tiers = PlanTier::for_tenant_type(tenant_type);
            for pair in tiers.windows(2) {
                assert!(pair[0].rank() < pair[1].rank());
                assert!(pair[0].monthly_price_cents() < pair[1].monthly_price_cents());
            }
        }
    }

    #[test]
    fn test_free_tiers_cost_nothing() {
        assert_eq!(PlanTier::Free.monthly_price_cents(), 0);
        assert_eq!(PlanTier::Startup.yearly_price_cents(), 0);
        assert_eq!(PlanTier::Pro.yearly_price_cents(), 19_000);
    }

    #[test]
    fn test_parse_and_display() {
        for tier in PlanTier::ALL {
            assert_eq!(tier.to_string().parse::<PlanTier>().unwrap(), tier);
        }
        assert_eq!("PREMIUM".parse::<PlanTier>().unwrap(), PlanTier::Premium);
        assert!("gold".parse::<PlanTier>().is_err());
    }

    #[test]
    fn test_feature_flags() {
        assert!(!PlanTier::Free.features().analytics);
        assert!(PlanTier::Premium.features().analytics);
        assert!(PlanTier::Enterprise.features().sso);
        assert_eq!(PlanTier::Enterprise.limits().team_seats, None);
    }
}
