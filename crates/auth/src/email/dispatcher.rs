use crate::email::monitor::EmailLimitMonitor;
use crate::email::service::{EmailMessage, Mailer};
use crate::error::Result;
use hirehub_models::PlanTier;
use std::sync::Arc;
use uuid::Uuid;

/// Sends tenant mail through the limit monitor
#[derive(Clone)]
pub struct MailDispatcher {
    mailer: Arc<dyn Mailer>,
    monitor: EmailLimitMonitor,
}

impl MailDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, monitor: EmailLimitMonitor) -> Self {
        Self { mailer, monitor }
    }

    pub fn monitor(&self) -> &EmailLimitMonitor {
        &self.monitor
    }

    /// Check the budgets, send, then count the email against the tenant.
    /// Nothing is counted when delivery fails. Once the mailer accepted the
    /// message the call succeeds even if counting it does not.
    pub async fn send_for_tenant(&self, tenant_id: Uuid, plan: PlanTier, email: EmailMessage) -> Result<()> {
        self.monitor.ensure_can_send(tenant_id, plan, 1).await?;
        self.mailer.send(email).await?;

        if let Err(e) = self.monitor.record(tenant_id, plan, 1).await {
            tracing::warn!(%tenant_id, error = %e, "Email sent but not counted");
        }

        Ok(())
    }

    /// Best-effort notification: failures and refusals are logged, never
    /// returned.
    pub async fn notify(&self, tenant_id: Uuid, plan: PlanTier, email: EmailMessage) {
        let subject = email.subject.clone();
        if let Err(e) = self.send_for_tenant(tenant_id, plan, email).await {
            tracing::warn!(%tenant_id, %subject, error = %e, "Notification email not sent");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::monitor::{EmailLimitConfig, MemoryUsageStore, UsageStore};
    use crate::error::AuthError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: EmailMessage) -> Result<()> {
            if self.fail {
                return Err(AuthError::Email("smtp down".to_string()));
            }
            self.sent.lock().unwrap().push(email.to);
            Ok(())
        }
    }

    /// Counters readable but never writable
    struct ReadOnlyStore;

    #[async_trait]
    impl UsageStore for ReadOnlyStore {
        async fn get(&self, _key: &str) -> Result<u64> {
            Ok(0)
        }

        async fn increment(&self, _key: &str, _by: u64, _ttl_secs: u64) -> Result<u64> {
            Err(AuthError::Internal("redis unavailable".to_string()))
        }

        async fn mark_once(&self, _key: &str, _ttl_secs: u64) -> Result<bool> {
            Err(AuthError::Internal("redis unavailable".to_string()))
        }
    }

    fn message() -> EmailMessage {
        EmailMessage {
            to: "jane@acme.io".to_string(),
            to_name: None,
            subject: "Hi".to_string(),
            text_body: "Hello".to_string(),
            html_body: None,
        }
    }

    fn monitor() -> EmailLimitMonitor {
        EmailLimitMonitor::new(Arc::new(MemoryUsageStore::new()), EmailLimitConfig::default())
    }

    #[tokio::test]
    async fn test_send_counts_against_tenant() {
        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = MailDispatcher::new(mailer.clone(), monitor());
        let tenant = Uuid::new_v4();

        dispatcher.send_for_tenant(tenant, PlanTier::Free, message()).await.unwrap();

        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
        let snapshot = dispatcher.monitor().snapshot(tenant, PlanTier::Free).await.unwrap();
        assert_eq!(snapshot.tenant.used, 1);
    }

    #[tokio::test]
    async fn test_send_refused_when_limit_reached() {
        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = MailDispatcher::new(mailer.clone(), monitor());
        let tenant = Uuid::new_v4();

        dispatcher.monitor().record(tenant, PlanTier::Free, 50).await.unwrap();

        let result = dispatcher.send_for_tenant(tenant, PlanTier::Free, message()).await;
        assert!(matches!(result, Err(AuthError::EmailLimitReached(_))));
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delivery_is_not_counted() {
        let mailer = Arc::new(RecordingMailer {
            fail: true,
            ..Default::default()
        });
        let dispatcher = MailDispatcher::new(mailer, monitor());
        let tenant = Uuid::new_v4();

        assert!(dispatcher.send_for_tenant(tenant, PlanTier::Free, message()).await.is_err());
        dispatcher.notify(tenant, PlanTier::Free, message()).await;

        let snapshot = dispatcher.monitor().snapshot(tenant, PlanTier::Free).await.unwrap();
        assert_eq!(snapshot.tenant.used, 0);
    }

    #[tokio::test]
    async fn test_delivered_email_succeeds_when_counting_fails() {
        let mailer = Arc::new(RecordingMailer::default());
        let monitor = EmailLimitMonitor::new(Arc::new(ReadOnlyStore), EmailLimitConfig::default());
        let dispatcher = MailDispatcher::new(mailer.clone(), monitor);

        let result = dispatcher.send_for_tenant(Uuid::new_v4(), PlanTier::Free, message()).await;

        assert!(result.is_ok());
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    }
}
