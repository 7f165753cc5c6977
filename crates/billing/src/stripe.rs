use crate::error::{BillingError, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

pub const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

// ============================================================================
// STRIPE OBJECTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripePrice {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionItem {
    pub id: String,
    pub price: StripePrice,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub items: StripeList<SubscriptionItem>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripeSubscription {
    pub fn first_item(&self) -> Option<&SubscriptionItem> {
        self.items.data.first()
    }

    pub fn price_id(&self) -> Option<&str> {
        self.first_item().map(|item| item.price.id.as_str())
    }

    /// Billing period. Newer API versions only report it on the items.
    pub fn period(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let item = self.first_item();
        let start = self
            .current_period_start
            .or_else(|| item.and_then(|i| i.current_period_start));
        let end = self
            .current_period_end
            .or_else(|| item.and_then(|i| i.current_period_end));

        (start.and_then(from_unix), end.and_then(from_unix))
    }
}

pub fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutParams {
    pub customer_id: String,
    pub price_id: String,
    pub tenant_id: Uuid,
    pub plan: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proration {
    /// Charge or credit the difference right away
    Immediate,
    /// New price applies from the next invoice
    None,
}

impl Proration {
    fn as_stripe(&self) -> &'static str {
        match self {
            Proration::Immediate => "always_invoice",
            Proration::None => "none",
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

// ============================================================================
// GATEWAY
// ============================================================================

/// The Stripe operations billing depends on
#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn create_customer(&self, email: &str, name: &str, tenant_id: Uuid) -> Result<StripeCustomer>;

    async fn create_checkout_session(&self, params: &CheckoutParams) -> Result<CheckoutSession>;

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<PortalSession>;

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription>;

    /// Swap the price of the subscription's single item. Any scheduled
    /// cancellation is lifted.
    async fn update_subscription_price(
        &self,
        subscription_id: &str,
        item_id: &str,
        price_id: &str,
        proration: Proration,
    ) -> Result<StripeSubscription>;

    async fn set_cancel_at_period_end(&self, subscription_id: &str, cancel: bool) -> Result<StripeSubscription>;
}

/// Stripe REST client
#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(secret_key: String) -> Result<Self> {
        Self::with_api_base(secret_key, STRIPE_API_BASE.to_string())
    }

    pub fn with_api_base(secret_key: String, api_base: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BillingError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            secret_key,
            api_base,
        })
    }

    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| BillingError::Configuration("STRIPE_SECRET_KEY not configured".to_string()))?;
        Self::new(secret_key)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.api_base, path);
        let mut request = self.http.request(method.clone(), &url).bearer_auth(&self.secret_key);
        if !form.is_empty() {
            request = request.form(form);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .ok()
                .map(|b| {
                    format!(
                        "{} ({})",
                        b.error.message.unwrap_or_default(),
                        b.error.kind.unwrap_or_else(|| "unknown".to_string())
                    )
                })
                .unwrap_or(body);

            tracing::error!(%method, path, status = status.as_u16(), %message, "Stripe request failed");
            return Err(BillingError::Stripe {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn create_customer(&self, email: &str, name: &str, tenant_id: Uuid) -> Result<StripeCustomer> {
        let form = [
            ("email", email.to_string()),
            ("name", name.to_string()),
            ("metadata[tenant_id]", tenant_id.to_string()),
        ];
        self.request(Method::POST, "/customers", &form).await
    }

    async fn create_checkout_session(&self, params: &CheckoutParams) -> Result<CheckoutSession> {
        let form = [
            ("mode", "subscription".to_string()),
            ("customer", params.customer_id.clone()),
            ("line_items[0][price]", params.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", params.success_url.clone()),
            ("cancel_url", params.cancel_url.clone()),
            ("client_reference_id", params.tenant_id.to_string()),
            ("metadata[tenant_id]", params.tenant_id.to_string()),
            ("metadata[plan]", params.plan.clone()),
            ("subscription_data[metadata][tenant_id]", params.tenant_id.to_string()),
        ];
        self.request(Method::POST, "/checkout/sessions", &form).await
    }

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<PortalSession> {
        let form = [
            ("customer", customer_id.to_string()),
            ("return_url", return_url.to_string()),
        ];
        self.request(Method::POST, "/billing_portal/sessions", &form).await
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription> {
        self.request(Method::GET, &format!("/subscriptions/{}", subscription_id), &[])
            .await
    }

    async fn update_subscription_price(
        &self,
        subscription_id: &str,
        item_id: &str,
        price_id: &str,
        proration: Proration,
    ) -> Result<StripeSubscription> {
        let form = [
            ("items[0][id]", item_id.to_string()),
            ("items[0][price]", price_id.to_string()),
            ("proration_behavior", proration.as_stripe().to_string()),
            ("cancel_at_period_end", "false".to_string()),
        ];
        self.request(Method::POST, &format!("/subscriptions/{}", subscription_id), &form)
            .await
    }

    async fn set_cancel_at_period_end(&self, subscription_id: &str, cancel: bool) -> Result<StripeSubscription> {
        let form = [("cancel_at_period_end", cancel.to_string())];
        self.request(Method::POST, &format!("/subscriptions/{}", subscription_id), &form)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_period_falls_back_to_item() {
        let json = serde_json::json!({
            "id": "sub_123",
            "customer": "cus_123",
            "status": "active",
            "items": { "data": [{
                "id": "si_1",
                "price": { "id": "price_pro_monthly" },
                "current_period_start": 1_700_000_000,
                "current_period_end": 1_702_592_000
            }]}
        });

        let sub: StripeSubscription = serde_json::from_value(json).unwrap();
        let (start, end) = sub.period();

        assert!(!sub.cancel_at_period_end);
        assert_eq!(sub.price_id(), Some("price_pro_monthly"));
        assert_eq!(start.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(end.unwrap().timestamp(), 1_702_592_000);
    }

    #[test]
    fn test_stripe_error_body() {
        let body = r#"{"error":{"message":"No such customer","type":"invalid_request_error"}}"#;
        let parsed: StripeErrorBody = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.message.as_deref(), Some("No such customer"));
        assert_eq!(parsed.error.kind.as_deref(), Some("invalid_request_error"));
    }
}
