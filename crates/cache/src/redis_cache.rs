use crate::error::Result;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("REDIS_URL").unwrap_or_else(|_| Self::default().url),
        }
    }
}

const INCR_WITH_TTL_SCRIPT: &str = r#"
local value = redis.call('INCRBY', KEYS[1], ARGV[1])
if redis.call('TTL', KEYS[1]) < 0 then
    redis.call('EXPIRE', KEYS[1], ARGV[2])
end
return value
"#;

#[derive(Clone)]
pub struct Cache {
    manager: ConnectionManager,
}

impl Cache {
    pub async fn new(config: CacheConfig) -> Result<Self> {
        let client = Client::open(config.url)?;
        let manager = ConnectionManager::new(client).await?;

        Ok(Self { manager })
    }

    /// Set a JSON value with optional TTL (seconds)
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: Option<u64>) -> Result<()> {
        let serialized = serde_json::to_string(value)?;
        let mut conn = self.manager.clone();

        match ttl_seconds {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, serialized, ttl).await?,
            None => conn.set::<_, _, ()>(key, serialized).await?,
        }

        Ok(())
    }

    /// Get a JSON value
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await?;

        match value {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    /// Read a plain integer counter, 0 when absent
    pub async fn get_counter(&self, key: &str) -> Result<i64> {
        let mut conn = self.manager.clone();
        let value: Option<i64> = conn.get(key).await?;
        Ok(value.unwrap_or(0))
    }

    /// Increment a counter by `by`. The TTL is set when the key has none,
    /// in the same script as the increment, so the window does not slide on
    /// every hit and a counter is never left without expiry.
    pub async fn incr_by_with_ttl(&self, key: &str, by: i64, ttl_seconds: u64) -> Result<i64> {
        let mut conn = self.manager.clone();
        let value: i64 = redis::Script::new(INCR_WITH_TTL_SCRIPT)
            .key(key)
            .arg(by)
            .arg(ttl_seconds)
            .invoke_async(&mut conn)
            .await?;

        Ok(value)
    }

    /// Set a marker only if it does not exist yet. Returns true when this
    /// call created it.
    pub async fn set_once(&self, key: &str, ttl_seconds: u64) -> Result<bool> {
        let mut conn = self.manager.clone();
        let created: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;

        Ok(created.is_some())
    }

    /// Seconds remaining on a key (-2 if missing, -1 without expiry)
    pub async fn ttl(&self, key: &str) -> Result<i64> {
        let mut conn = self.manager.clone();
        let ttl: i64 = conn.ttl(key).await?;
        Ok(ttl)
    }

    /// Ping Redis to check connection
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }
}

// Helper functions for common cache key patterns
pub fn rate_limit_key(scope: &str, identifier: &str) -> String {
    format!("ratelimit:{}:{}", scope, identifier)
}

/// Monthly email counter of a tenant, `period` formatted as `YYYY-MM`
pub fn email_tenant_usage_key(tenant_id: &str, period: &str) -> String {
    format!("email:usage:tenant:{}:{}", tenant_id, period)
}

/// Daily provider-wide email counter, `day` formatted as `YYYY-MM-DD`
pub fn email_global_usage_key(day: &str) -> String {
    format!("email:usage:global:{}", day)
}

pub fn email_alert_key(scope: &str, level: &str, period: &str) -> String {
    format!("email:alert:{}:{}:{}", scope, level, period)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_helpers() {
        assert_eq!(rate_limit_key("login", "1.2.3.4"), "ratelimit:login:1.2.3.4");
        assert_eq!(
            email_tenant_usage_key("t1", "2025-03"),
            "email:usage:tenant:t1:2025-03"
        );
        assert_eq!(email_global_usage_key("2025-03-01"), "email:usage:global:2025-03-01");
        assert_eq!(
            email_alert_key("tenant:t1", "warning", "2025-03"),
            "email:alert:tenant:t1:warning:2025-03"
        );
    }

    #[tokio::test]
    #[ignore] // Only run with Redis available
    async fn test_redis_connection() {
        let cache = Cache::new(CacheConfig::from_env()).await.expect("Failed to connect to Redis");
        cache.ping().await.expect("Failed to ping Redis");
    }

    #[tokio::test]
    #[ignore]
    async fn test_counter_and_marker() {
        let cache = Cache::new(CacheConfig::from_env()).await.unwrap();
        cache.delete("test:counter").await.unwrap();
        cache.delete("test:marker").await.unwrap();

        assert_eq!(cache.incr_by_with_ttl("test:counter", 2, 60).await.unwrap(), 2);
        assert_eq!(cache.incr_by_with_ttl("test:counter", 1, 60).await.unwrap(), 3);
        assert_eq!(cache.get_counter("test:counter").await.unwrap(), 3);

        assert!(cache.set_once("test:marker", 60).await.unwrap());
        assert!(!cache.set_once("test:marker", 60).await.unwrap());

        cache.delete("test:counter").await.unwrap();
        cache.delete("test:marker").await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_counter_always_carries_ttl() {
        let cache = Cache::new(CacheConfig::from_env()).await.unwrap();
        cache.delete("test:ttl_counter").await.unwrap();

        cache.incr_by_with_ttl("test:ttl_counter", 1, 60).await.unwrap();
        let ttl = cache.ttl("test:ttl_counter").await.unwrap();
        assert!(ttl > 0 && ttl <= 60);

        // A counter left without expiry gets one on its next increment
        cache.set("test:ttl_counter", &5i64, None).await.unwrap();
        assert_eq!(cache.ttl("test:ttl_counter").await.unwrap(), -1);
        assert_eq!(cache.incr_by_with_ttl("test:ttl_counter", 1, 60).await.unwrap(), 6);
        assert!(cache.ttl("test:ttl_counter").await.unwrap() > 0);

        cache.delete("test:ttl_counter").await.unwrap();
    }
}
