pub mod dispatcher;
pub mod monitor;
pub mod service;
pub mod templates;

pub use dispatcher::MailDispatcher;
pub use monitor::{
    usage_level, EmailLimitConfig, EmailLimitMonitor, MemoryUsageStore, RedisUsageStore, UsageStore,
};
pub use service::{EmailMessage, EmailProvider, EmailService, Mailer};
