use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How close a counter is to its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageLevel {
    Normal,
    Warning,
    Exceeded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageCounter {
    pub used: u64,
    /// `None` means unlimited
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    pub level: UsageLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailUsageSnapshot {
    pub tenant_id: Uuid,
    /// Calendar month the tenant counter covers, `YYYY-MM`
    pub period: String,
    pub tenant: UsageCounter,
    /// Shared provider budget for the current UTC day
    pub provider: UsageCounter,
    pub can_send: bool,
}
