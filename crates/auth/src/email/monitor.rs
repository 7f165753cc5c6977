use crate::error::{AuthError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hirehub_cache::{email_alert_key, email_global_usage_key, email_tenant_usage_key, Cache};
use hirehub_models::{EmailUsageSnapshot, PlanTier, UsageCounter, UsageLevel};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// Counters outlive their period a little so late reads still see them
const MONTHLY_TTL_SECS: u64 = 35 * 24 * 3600;
const DAILY_TTL_SECS: u64 = 2 * 24 * 3600;

/// Storage for email counters and alert markers
#[async_trait]
pub trait UsageStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<u64>;

    /// Add `by` and return the new total
    async fn increment(&self, key: &str, by: u64, ttl_secs: u64) -> Result<u64>;

    /// Create a marker; `true` only for the call that created it
    async fn mark_once(&self, key: &str, ttl_secs: u64) -> Result<bool>;
}

/// Redis-backed store used in production
#[derive(Clone)]
pub struct RedisUsageStore {
    cache: Cache,
}

impl RedisUsageStore {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl UsageStore for RedisUsageStore {
    async fn get(&self, key: &str) -> Result<u64> {
        Ok(self.cache.get_counter(key).await?.max(0) as u64)
    }

    async fn increment(&self, key: &str, by: u64, ttl_secs: u64) -> Result<u64> {
        let value = self.cache.incr_by_with_ttl(key, by as i64, ttl_secs).await?;
        Ok(value.max(0) as u64)
    }

    async fn mark_once(&self, key: &str, ttl_secs: u64) -> Result<bool> {
        Ok(self.cache.set_once(key, ttl_secs).await?)
    }
}

/// Process-local store, used when Redis is not wanted (tests, single node)
#[derive(Default)]
pub struct MemoryUsageStore {
    counters: Mutex<HashMap<String, u64>>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, u64>>> {
        self.counters
            .lock()
            .map_err(|_| AuthError::Internal("usage store lock poisoned".to_string()))
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn get(&self, key: &str) -> Result<u64> {
        Ok(self.lock()?.get(key).copied().unwrap_or(0))
    }

    async fn increment(&self, key: &str, by: u64, _ttl_secs: u64) -> Result<u64> {
        let mut counters = self.lock()?;
        let value = counters.entry(key.to_string()).or_insert(0);
        *value += by;
        Ok(*value)
    }

    async fn mark_once(&self, key: &str, _ttl_secs: u64) -> Result<bool> {
        let mut counters = self.lock()?;
        if counters.contains_key(key) {
            return Ok(false);
        }
        counters.insert(key.to_string(), 1);
        Ok(true)
    }
}

#[derive(Debug, Clone)]
pub struct EmailLimitConfig {
    /// Emails the provider accepts per UTC day across all tenants
    pub daily_provider_limit: u64,
    /// Percentage of a budget at which the level becomes `Warning`
    pub warning_threshold_percent: u8,
}

impl Default for EmailLimitConfig {
    fn default() -> Self {
        Self {
            daily_provider_limit: 300,
            warning_threshold_percent: 80,
        }
    }
}

impl EmailLimitConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            daily_provider_limit: std::env::var("EMAIL_DAILY_PROVIDER_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.daily_provider_limit),
            warning_threshold_percent: std::env::var("EMAIL_WARNING_THRESHOLD_PERCENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|p: &u8| (1..=100).contains(p))
                .unwrap_or(defaults.warning_threshold_percent),
        }
    }
}

/// Classify a counter against its budget
pub fn usage_level(used: u64, limit: Option<u64>, warning_threshold_percent: u8) -> UsageLevel {
    match limit {
        None => UsageLevel::Normal,
        Some(limit) if used >= limit => UsageLevel::Exceeded,
        Some(limit) if used * 100 >= limit * warning_threshold_percent as u64 => UsageLevel::Warning,
        Some(_) => UsageLevel::Normal,
    }
}

fn counter(used: u64, limit: Option<u64>, warning_threshold_percent: u8) -> UsageCounter {
    UsageCounter {
        used,
        limit,
        remaining: limit.map(|l| l.saturating_sub(used)),
        level: usage_level(used, limit, warning_threshold_percent),
    }
}

/// Tracks per-tenant monthly email usage against the plan limit and the
/// provider-wide daily budget.
#[derive(Clone)]
pub struct EmailLimitMonitor {
    store: Arc<dyn UsageStore>,
    config: EmailLimitConfig,
}

impl EmailLimitMonitor {
    pub fn new(store: Arc<dyn UsageStore>, config: EmailLimitConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &EmailLimitConfig {
        &self.config
    }

    fn periods(now: DateTime<Utc>) -> (String, String) {
        (now.format("%Y-%m").to_string(), now.format("%Y-%m-%d").to_string())
    }

    /// Current usage of a tenant and of the provider budget
    pub async fn snapshot(&self, tenant_id: Uuid, plan: PlanTier) -> Result<EmailUsageSnapshot> {
        self.snapshot_at(tenant_id, plan, Utc::now()).await
    }

    pub async fn snapshot_at(
        &self,
        tenant_id: Uuid,
        plan: PlanTier,
        now: DateTime<Utc>,
    ) -> Result<EmailUsageSnapshot> {
        let (month, day) = Self::periods(now);
        let tenant_used = self
            .store
            .get(&email_tenant_usage_key(&tenant_id.to_string(), &month))
            .await?;
        let provider_used = self.store.get(&email_global_usage_key(&day)).await?;

        Ok(self.build_snapshot(tenant_id, plan, month, tenant_used, provider_used))
    }

    fn build_snapshot(
        &self,
        tenant_id: Uuid,
        plan: PlanTier,
        period: String,
        tenant_used: u64,
        provider_used: u64,
    ) -> EmailUsageSnapshot {
        let pct = self.config.warning_threshold_percent;
        let tenant = counter(
            tenant_used,
            plan.limits().emails_per_month.map(u64::from),
            pct,
        );
        let provider = counter(provider_used, Some(self.config.daily_provider_limit), pct);
        let can_send = tenant.level != UsageLevel::Exceeded && provider.level != UsageLevel::Exceeded;

        EmailUsageSnapshot {
            tenant_id,
            period,
            tenant,
            provider,
            can_send,
        }
    }

    /// Refuse when sending `count` more emails would exceed either budget
    pub async fn ensure_can_send(&self, tenant_id: Uuid, plan: PlanTier, count: u64) -> Result<()> {
        let snapshot = self.snapshot(tenant_id, plan).await?;

        if let Some(remaining) = snapshot.tenant.remaining {
            if count > remaining {
                return Err(AuthError::EmailLimitReached(format!(
                    "monthly email limit of {} reached for the {} plan",
                    snapshot.tenant.limit.unwrap_or_default(),
                    plan.display_name()
                )));
            }
        }

        if let Some(remaining) = snapshot.provider.remaining {
            if count > remaining {
                return Err(AuthError::EmailLimitReached(
                    "daily sending capacity reached, try again tomorrow".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Count `count` sent emails and emit an alert the first time a budget
    /// reaches a new level within its period.
    pub async fn record(&self, tenant_id: Uuid, plan: PlanTier, count: u64) -> Result<EmailUsageSnapshot> {
        self.record_at(tenant_id, plan, count, Utc::now()).await
    }

    pub async fn record_at(
        &self,
        tenant_id: Uuid,
        plan: PlanTier,
        count: u64,
        now: DateTime<Utc>,
    ) -> Result<EmailUsageSnapshot> {
        let (month, day) = Self::periods(now);
        let tenant_key = tenant_id.to_string();

        let tenant_used = self
            .store
            .increment(&email_tenant_usage_key(&tenant_key, &month), count, MONTHLY_TTL_SECS)
            .await?;
        let provider_used = self
            .store
            .increment(&email_global_usage_key(&day), count, DAILY_TTL_SECS)
            .await?;

        let snapshot = self.build_snapshot(tenant_id, plan, month.clone(), tenant_used, provider_used);

        self.alert_once(&format!("tenant:{}", tenant_key), &month, &snapshot.tenant)
            .await?;
        self.alert_once("provider", &day, &snapshot.provider).await?;

        Ok(snapshot)
    }

    async fn alert_once(&self, scope: &str, period: &str, usage: &UsageCounter) -> Result<bool> {
        let level = match usage.level {
            UsageLevel::Normal => return Ok(false),
            UsageLevel::Warning => "warning",
            UsageLevel::Exceeded => "exceeded",
        };

        let first = self
            .store
            .mark_once(&email_alert_key(scope, level, period), MONTHLY_TTL_SECS)
            .await?;

        if first {
            tracing::warn!(
                scope,
                period,
                level,
                used = usage.used,
                limit = ?usage.limit,
                "Email usage alert"
            );
        }

        Ok(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn monitor(daily: u64) -> EmailLimitMonitor {
        EmailLimitMonitor::new(
            Arc::new(MemoryUsageStore::new()),
            EmailLimitConfig {
                daily_provider_limit: daily,
                warning_threshold_percent: 80,
            },
        )
    }

    #[test]
    fn test_usage_level_thresholds() {
        assert_eq!(usage_level(0, Some(50), 80), UsageLevel::Normal);
        assert_eq!(usage_level(39, Some(50), 80), UsageLevel::Normal);
        assert_eq!(usage_level(40, Some(50), 80), UsageLevel::Warning);
        assert_eq!(usage_level(50, Some(50), 80), UsageLevel::Exceeded);
        assert_eq!(usage_level(75, Some(50), 80), UsageLevel::Exceeded);
        assert_eq!(usage_level(1_000_000, None, 80), UsageLevel::Normal);
    }

    #[tokio::test]
    async fn test_snapshot_starts_empty() {
        let monitor = monitor(300);
        let tenant = Uuid::new_v4();

        let snapshot = monitor.snapshot(tenant, PlanTier::Free).await.unwrap();
        assert_eq!(snapshot.tenant.used, 0);
        assert_eq!(snapshot.tenant.limit, Some(50));
        assert_eq!(snapshot.tenant.remaining, Some(50));
        assert_eq!(snapshot.provider.limit, Some(300));
        assert!(snapshot.can_send);
    }

    #[tokio::test]
    async fn test_tenant_limit_blocks_sending() {
        let monitor = monitor(10_000);
        let tenant = Uuid::new_v4();

        monitor.record(tenant, PlanTier::Free, 49).await.unwrap();
        assert!(monitor.ensure_can_send(tenant, PlanTier::Free, 1).await.is_ok());
        assert!(matches!(
            monitor.ensure_can_send(tenant, PlanTier::Free, 2).await,
            Err(AuthError::EmailLimitReached(_))
        ));

        let snapshot = monitor.record(tenant, PlanTier::Free, 1).await.unwrap();
        assert_eq!(snapshot.tenant.level, UsageLevel::Exceeded);
        assert!(!snapshot.can_send);

        // Upgrading raises the ceiling for the same counter
        assert!(monitor.ensure_can_send(tenant, PlanTier::Pro, 1).await.is_ok());
    }

    #[tokio::test]
    async fn test_provider_budget_is_shared_between_tenants() {
        let monitor = monitor(10);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        monitor.record(a, PlanTier::Business, 6).await.unwrap();
        let snapshot = monitor.record(b, PlanTier::Business, 4).await.unwrap();

        assert_eq!(snapshot.tenant.used, 4);
        assert_eq!(snapshot.provider.used, 10);
        assert_eq!(snapshot.provider.level, UsageLevel::Exceeded);
        assert!(monitor.ensure_can_send(a, PlanTier::Business, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_alert_fires_once_per_level_and_period() {
        let store = Arc::new(MemoryUsageStore::new());
        let monitor = EmailLimitMonitor::new(store.clone(), EmailLimitConfig::default());
        let tenant = Uuid::new_v4();
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap();

        monitor.record_at(tenant, PlanTier::Free, 40, now).await.unwrap();
        let key = email_alert_key(&format!("tenant:{}", tenant), "warning", "2025-03");
        assert_eq!(store.get(&key).await.unwrap(), 1);
        assert!(!store.mark_once(&key, 60).await.unwrap());

        // Still in warning: no new marker for a different level
        monitor.record_at(tenant, PlanTier::Free, 1, now).await.unwrap();
        let exceeded = email_alert_key(&format!("tenant:{}", tenant), "exceeded", "2025-03");
        assert_eq!(store.get(&exceeded).await.unwrap(), 0);

        monitor.record_at(tenant, PlanTier::Free, 9, now).await.unwrap();
        assert_eq!(store.get(&exceeded).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_counters_reset_with_new_month() {
        let monitor = monitor(10_000);
        let tenant = Uuid::new_v4();
        let march = Utc.with_ymd_and_hms(2025, 3, 31, 23, 0, 0).unwrap();
        let april = Utc.with_ymd_and_hms(2025, 4, 1, 1, 0, 0).unwrap();

        monitor.record_at(tenant, PlanTier::Free, 50, march).await.unwrap();

        let snapshot = monitor.snapshot_at(tenant, PlanTier::Free, april).await.unwrap();
        assert_eq!(snapshot.period, "2025-04");
        assert_eq!(snapshot.tenant.used, 0);
        assert!(snapshot.can_send);
    }
}
