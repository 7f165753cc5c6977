use crate::error::{DatabaseError, Result};
use hirehub_models::{NewSubscription, Subscription, UpdateSubscription};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert the initial subscription of a tenant
    pub async fn insert(conn: &mut PgConnection, new_subscription: &NewSubscription) -> Result<Subscription> {
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (tenant_id, plan, status, billing_cycle, stripe_customer_id)
            VALUES ($1, $2, 'active', 'monthly', $3)
            RETURNING *
            "#,
        )
        .bind(new_subscription.tenant_id)
        .bind(new_subscription.plan)
        .bind(&new_subscription.stripe_customer_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(subscription)
    }

    pub async fn find_by_tenant(&self, tenant_id: Uuid) -> Result<Subscription> {
        sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Subscription", &tenant_id.to_string()))
    }

    pub async fn find_by_stripe_subscription(&self, stripe_subscription_id: &str) -> Result<Option<Subscription>> {
        let subscription = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE stripe_subscription_id = $1",
        )
        .bind(stripe_subscription_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subscription)
    }

    pub async fn find_by_stripe_customer(&self, stripe_customer_id: &str) -> Result<Option<Subscription>> {
        let subscription = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE stripe_customer_id = $1",
        )
        .bind(stripe_customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subscription)
    }

    /// Apply the fields present in `update`. Nested options clear a column
    /// when set to `Some(None)`.
    pub async fn update(&self, tenant_id: Uuid, update: &UpdateSubscription) -> Result<Subscription> {
        let mut query_builder =
            sqlx::QueryBuilder::new("UPDATE subscriptions SET updated_at = NOW()");

        if let Some(plan) = update.plan {
            query_builder.push(", plan = ");
            query_builder.push_bind(plan);
        }

        if let Some(status) = update.status {
            query_builder.push(", status = ");
            query_builder.push_bind(status);
        }

        if let Some(cycle) = update.billing_cycle {
            query_builder.push(", billing_cycle = ");
            query_builder.push_bind(cycle);
        }

        if let Some(cancel) = update.cancel_at_period_end {
            query_builder.push(", cancel_at_period_end = ");
            query_builder.push_bind(cancel);
        }

        if let Some(canceled_at) = update.canceled_at {
            query_builder.push(", canceled_at = ");
            query_builder.push_bind(canceled_at);
        }

        if let Some(ref customer) = update.stripe_customer_id {
            query_builder.push(", stripe_customer_id = ");
            query_builder.push_bind(customer.clone());
        }

        if let Some(ref subscription_id) = update.stripe_subscription_id {
            query_builder.push(", stripe_subscription_id = ");
            query_builder.push_bind(subscription_id.clone());
        }

        if let Some(start) = update.current_period_start {
            query_builder.push(", current_period_start = ");
            query_builder.push_bind(start);
        }

        if let Some(end) = update.current_period_end {
            query_builder.push(", current_period_end = ");
            query_builder.push_bind(end);
        }

        query_builder.push(" WHERE tenant_id = ");
        query_builder.push_bind(tenant_id);
        query_builder.push(" RETURNING *");

        let subscription = query_builder
            .build_query_as::<Subscription>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Subscription", &tenant_id.to_string()))?;

        Ok(subscription)
    }
}
