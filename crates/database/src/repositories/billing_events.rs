use crate::error::Result;
use hirehub_models::BillingEvent;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct BillingEventRepository {
    pool: PgPool,
}

impl BillingEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a processed webhook event. Returns `false` when the event id
    /// was already recorded.
    pub async fn record(
        &self,
        stripe_event_id: &str,
        event_type: &str,
        tenant_id: Option<Uuid>,
        data: &serde_json::Value,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO billing_events (stripe_event_id, event_type, tenant_id, data)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (stripe_event_id) DO NOTHING
            "#,
        )
        .bind(stripe_event_id)
        .bind(event_type)
        .bind(tenant_id)
        .bind(data)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn exists(&self, stripe_event_id: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM billing_events WHERE stripe_event_id = $1)",
        )
        .bind(stripe_event_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    pub async fn list_for_tenant(&self, tenant_id: Uuid, limit: i64) -> Result<Vec<BillingEvent>> {
        let events = sqlx::query_as::<_, BillingEvent>(
            r#"
            SELECT * FROM billing_events
            WHERE tenant_id = $1
            ORDER BY processed_at DESC
            LIMIT $2
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}
