pub mod error;
pub mod redis_cache;

pub use error::{CacheError, Result};
pub use redis_cache::{
    email_alert_key, email_global_usage_key, email_tenant_usage_key, rate_limit_key,
    Cache, CacheConfig,
};
