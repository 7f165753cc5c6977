use crate::catalog::PriceCatalog;
use crate::error::{BillingError, Result};
use crate::lifecycle::{plan_transition, PlanTransition, SubscriptionState};
use crate::stripe::{CheckoutParams, CheckoutSession, PortalSession, Proration, StripeGateway, StripeSubscription};
use crate::webhook::{verify_signature, StripeEvent, WebhookEvent};
use chrono::{DateTime, Utc};
use hirehub_auth::email::{templates, EmailMessage, MailDispatcher};
use hirehub_database::{
    BillingEventRepository, Database, MemberRepository, SubscriptionRepository, TenantRepository,
};
use hirehub_models::{
    BillingCycle, ChangePlanRequest, ChangePlanResponse, PlanInfo, PlanTier, Subscription,
    SubscriptionOverview, SubscriptionStatus, TenantType, UpdateSubscription,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Processed,
    Duplicate,
    Ignored,
}

/// Result of the Stripe side of a plan change
#[derive(Debug, Clone)]
pub enum GatewayOutcome {
    Checkout(CheckoutSession),
    PriceChanged(StripeSubscription),
    CancelScheduled(StripeSubscription),
}

/// Perform the Stripe calls a transition needs. Checkout requires the
/// customer to exist already.
pub async fn execute_transition(
    gateway: &dyn StripeGateway,
    catalog: &PriceCatalog,
    subscription: &Subscription,
    transition: PlanTransition,
    request: &ChangePlanRequest,
    return_base: &str,
) -> Result<GatewayOutcome> {
    match transition {
        PlanTransition::NoChange => Err(BillingError::InvalidState(format!(
            "Already on the {} plan",
            subscription.plan.display_name()
        ))),
        PlanTransition::Checkout => {
            let customer_id = subscription
                .stripe_customer_id
                .clone()
                .ok_or_else(|| BillingError::InvalidState("No Stripe customer".to_string()))?;

            let params = CheckoutParams {
                customer_id,
                price_id: catalog.price_for(request.plan, request.billing_cycle)?.to_string(),
                tenant_id: subscription.tenant_id,
                plan: request.plan.to_string(),
                success_url: request
                    .success_url
                    .clone()
                    .unwrap_or_else(|| format!("{}?checkout=success", return_base)),
                cancel_url: request
                    .cancel_url
                    .clone()
                    .unwrap_or_else(|| format!("{}?checkout=canceled", return_base)),
            };

            Ok(GatewayOutcome::Checkout(gateway.create_checkout_session(&params).await?))
        }
        PlanTransition::Upgrade | PlanTransition::Downgrade => {
            let stripe_id = stripe_subscription_id(subscription)?;
            let current = gateway.retrieve_subscription(stripe_id).await?;
            let item = current
                .first_item()
                .ok_or_else(|| BillingError::InvalidState("Stripe subscription has no items".to_string()))?;

            let proration = if transition == PlanTransition::Upgrade {
                Proration::Immediate
            } else {
                Proration::None
            };

            let updated = gateway
                .update_subscription_price(
                    stripe_id,
                    &item.id,
                    catalog.price_for(request.plan, request.billing_cycle)?,
                    proration,
                )
                .await?;

            Ok(GatewayOutcome::PriceChanged(updated))
        }
        PlanTransition::CancelToFree => {
            let stripe_id = stripe_subscription_id(subscription)?;
            Ok(GatewayOutcome::CancelScheduled(
                gateway.set_cancel_at_period_end(stripe_id, true).await?,
            ))
        }
    }
}

fn stripe_subscription_id(subscription: &Subscription) -> Result<&str> {
    subscription
        .stripe_subscription_id
        .as_deref()
        .ok_or_else(|| BillingError::InvalidState("No active paid subscription".to_string()))
}

/// Local columns that mirror a Stripe subscription. The tier only changes
/// when the price is known and belongs to the tenant's type.
pub fn sync_from_stripe(
    stripe: &StripeSubscription,
    catalog: &PriceCatalog,
    tenant_type: TenantType,
) -> UpdateSubscription {
    let (start, end) = stripe.period();
    let mut update = UpdateSubscription {
        status: Some(SubscriptionStatus::from_stripe(&stripe.status)),
        cancel_at_period_end: Some(stripe.cancel_at_period_end),
        stripe_customer_id: Some(stripe.customer.clone()),
        stripe_subscription_id: Some(Some(stripe.id.clone())),
        current_period_start: Some(start),
        current_period_end: Some(end),
        ..Default::default()
    };

    if !stripe.cancel_at_period_end {
        update.canceled_at = Some(None);
    }

    match stripe.price_id().and_then(|price| catalog.lookup(price)) {
        Some((tier, cycle)) if tier.tenant_type() == tenant_type => {
            update.plan = Some(tier);
            update.billing_cycle = Some(cycle);
        }
        Some((tier, _)) => {
            tracing::warn!(subscription = %stripe.id, %tier, "Stripe price belongs to another tenant type");
        }
        None => {
            tracing::warn!(subscription = %stripe.id, price = ?stripe.price_id(), "Unknown Stripe price");
        }
    }

    update
}

/// A paid subscription can be scheduled to end once
pub fn ensure_cancellable(subscription: &Subscription) -> Result<()> {
    if subscription.plan.is_free() || !subscription.has_stripe_subscription() {
        return Err(BillingError::InvalidState("No paid subscription to cancel".to_string()));
    }
    if subscription.cancel_at_period_end {
        return Err(BillingError::InvalidState(
            "Subscription is already scheduled to end".to_string(),
        ));
    }
    Ok(())
}

/// A scheduled cancellation can be undone until the period ends
pub fn ensure_reactivatable(subscription: &Subscription, now: DateTime<Utc>) -> Result<()> {
    if !subscription.cancel_at_period_end {
        return Err(BillingError::InvalidState(
            "Subscription is not scheduled for cancellation".to_string(),
        ));
    }
    if subscription.current_period_end.is_some_and(|end| end <= now) {
        return Err(BillingError::InvalidState(
            "The billing period has already ended".to_string(),
        ));
    }
    Ok(())
}

/// Columns reset once Stripe deletes the subscription: the tenant is back
/// on the default tier of its type, with no Stripe subscription attached.
pub fn ended_subscription(tenant_type: TenantType, now: DateTime<Utc>) -> UpdateSubscription {
    UpdateSubscription {
        plan: Some(PlanTier::default_for(tenant_type)),
        status: Some(SubscriptionStatus::Active),
        billing_cycle: Some(BillingCycle::Monthly),
        cancel_at_period_end: Some(false),
        canceled_at: Some(Some(now)),
        stripe_subscription_id: Some(None),
        current_period_start: Some(None),
        current_period_end: Some(None),
        ..Default::default()
    }
}

/// Status change an invoice event makes. Free tiers have nothing to bill.
pub fn invoice_update(local: &Subscription, payment_succeeded: bool) -> Option<UpdateSubscription> {
    if local.plan.is_free() {
        return None;
    }

    let status = if payment_succeeded {
        SubscriptionStatus::Active
    } else {
        SubscriptionStatus::PastDue
    };

    Some(UpdateSubscription {
        status: Some(status),
        ..Default::default()
    })
}

#[derive(Clone)]
pub struct BillingService {
    gateway: Arc<dyn StripeGateway>,
    catalog: PriceCatalog,
    subscriptions: SubscriptionRepository,
    tenants: TenantRepository,
    members: MemberRepository,
    events: BillingEventRepository,
    mail: MailDispatcher,
    webhook_secret: String,
    base_url: String,
}

impl BillingService {
    pub fn new(
        db: &Database,
        gateway: Arc<dyn StripeGateway>,
        catalog: PriceCatalog,
        mail: MailDispatcher,
        webhook_secret: String,
        base_url: String,
    ) -> Self {
        let pool = db.pool().clone();

        Self {
            gateway,
            catalog,
            subscriptions: SubscriptionRepository::new(pool.clone()),
            tenants: TenantRepository::new(pool.clone()),
            members: MemberRepository::new(pool.clone()),
            events: BillingEventRepository::new(pool),
            mail,
            webhook_secret,
            base_url,
        }
    }

    fn billing_page(&self) -> String {
        format!("{}/dashboard/billing", self.base_url)
    }

    pub fn list_plans(&self, tenant_type: TenantType) -> Vec<PlanInfo> {
        PlanTier::for_tenant_type(tenant_type)
            .into_iter()
            .map(|tier| tier.info())
            .collect()
    }

    pub async fn get_subscription(&self, tenant_id: Uuid) -> Result<SubscriptionOverview> {
        let subscription = self.subscriptions.find_by_tenant(tenant_id).await?;

        Ok(SubscriptionOverview {
            effective_plan: subscription.effective_plan(),
            plan: subscription.plan.info(),
            subscription,
        })
    }

    pub async fn change_plan(&self, tenant_id: Uuid, request: ChangePlanRequest) -> Result<ChangePlanResponse> {
        let mut subscription = self.subscriptions.find_by_tenant(tenant_id).await?;
        let transition = plan_transition(SubscriptionState::from(&subscription), request.plan)?;

        if transition == PlanTransition::Checkout && subscription.stripe_customer_id.is_none() {
            subscription = self.ensure_customer(subscription).await?;
        }

        let outcome = execute_transition(
            self.gateway.as_ref(),
            &self.catalog,
            &subscription,
            transition,
            &request,
            &self.billing_page(),
        )
        .await?;

        let response = match outcome {
            GatewayOutcome::Checkout(session) => {
                let checkout_url = session
                    .url
                    .ok_or_else(|| BillingError::InvalidState("Checkout session has no URL".to_string()))?;

                tracing::info!(%tenant_id, plan = %request.plan, session = %session.id, "Checkout started");
                ChangePlanResponse::CheckoutRequired {
                    checkout_url,
                    session_id: session.id,
                }
            }
            GatewayOutcome::PriceChanged(stripe) => {
                let mut update = sync_from_stripe(&stripe, &self.catalog, request.plan.tenant_type());
                update.plan = Some(request.plan);
                update.billing_cycle = Some(request.billing_cycle);

                let updated = self.subscriptions.update(tenant_id, &update).await?;

                tracing::info!(
                    %tenant_id,
                    from = %subscription.plan,
                    to = %request.plan,
                    ?transition,
                    "Subscription plan changed"
                );

                if transition == PlanTransition::Upgrade {
                    ChangePlanResponse::Upgraded { subscription: updated }
                } else {
                    ChangePlanResponse::Downgraded { subscription: updated }
                }
            }
            GatewayOutcome::CancelScheduled(_) => {
                let updated = self.schedule_cancellation(tenant_id).await?;
                ChangePlanResponse::ScheduledCancellation { subscription: updated }
            }
        };

        Ok(response)
    }

    /// Cancel the paid subscription at the end of the current period
    pub async fn cancel(&self, tenant_id: Uuid) -> Result<Subscription> {
        let subscription = self.subscriptions.find_by_tenant(tenant_id).await?;
        ensure_cancellable(&subscription)?;

        self.gateway
            .set_cancel_at_period_end(stripe_subscription_id(&subscription)?, true)
            .await?;

        self.schedule_cancellation(tenant_id).await
    }

    /// Undo a scheduled cancellation while the period is still running
    pub async fn reactivate(&self, tenant_id: Uuid) -> Result<Subscription> {
        let subscription = self.subscriptions.find_by_tenant(tenant_id).await?;
        ensure_reactivatable(&subscription, Utc::now())?;

        self.gateway
            .set_cancel_at_period_end(stripe_subscription_id(&subscription)?, false)
            .await?;

        let updated = self
            .subscriptions
            .update(
                tenant_id,
                &UpdateSubscription {
                    cancel_at_period_end: Some(false),
                    canceled_at: Some(None),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(%tenant_id, plan = %updated.plan, "Subscription reactivated");
        Ok(updated)
    }

    pub async fn create_portal_session(&self, tenant_id: Uuid, return_url: Option<String>) -> Result<PortalSession> {
        let subscription = self.subscriptions.find_by_tenant(tenant_id).await?;
        let customer_id = subscription
            .stripe_customer_id
            .as_deref()
            .ok_or_else(|| BillingError::InvalidState("No billing account yet".to_string()))?;

        let return_url = return_url.unwrap_or_else(|| self.billing_page());
        self.gateway.create_portal_session(customer_id, &return_url).await
    }

    // ------------------------------------------------------------------
    // Webhooks
    // ------------------------------------------------------------------

    pub async fn handle_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookOutcome> {
        verify_signature(payload, signature, &self.webhook_secret, Utc::now().timestamp())?;

        let event = WebhookEvent::from_payload(payload)?;
        if self.events.exists(&event.id).await? {
            tracing::debug!(event_id = %event.id, "Duplicate Stripe event");
            return Ok(WebhookOutcome::Duplicate);
        }

        let tenant_id = match event.parse()? {
            StripeEvent::CheckoutCompleted {
                session_id,
                tenant_id,
                customer_id,
                subscription_id,
            } => {
                self.on_checkout_completed(&session_id, tenant_id, customer_id, subscription_id)
                    .await?
            }
            StripeEvent::SubscriptionUpdated(stripe) => self.on_subscription_updated(&stripe).await?,
            StripeEvent::SubscriptionDeleted(stripe) => self.on_subscription_deleted(&stripe).await?,
            StripeEvent::InvoicePaid {
                customer_id,
                subscription_id,
            } => {
                self.on_invoice(customer_id, subscription_id, true).await?
            }
            StripeEvent::InvoicePaymentFailed {
                customer_id,
                subscription_id,
            } => {
                let tenant_id = self
                    .on_invoice(customer_id, subscription_id, false)
                    .await?;
                if let Some(tenant_id) = tenant_id {
                    self.notify_payment_failed(tenant_id).await;
                }
                tenant_id
            }
            StripeEvent::Ignored => {
                tracing::debug!(event_id = %event.id, event_type = %event.event_type, "Unhandled Stripe event");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        // Recorded after processing so a failed event is retried by Stripe
        if !self
            .events
            .record(&event.id, &event.event_type, tenant_id, &event.data.object)
            .await?
        {
            return Ok(WebhookOutcome::Duplicate);
        }

        tracing::info!(event_id = %event.id, event_type = %event.event_type, tenant_id = ?tenant_id, "Stripe event processed");
        Ok(WebhookOutcome::Processed)
    }

    async fn on_checkout_completed(
        &self,
        session_id: &str,
        tenant_id: Uuid,
        customer_id: Option<String>,
        subscription_id: Option<String>,
    ) -> Result<Option<Uuid>> {
        let subscription_id = subscription_id.ok_or_else(|| {
            BillingError::InvalidPayload(format!("checkout session {} has no subscription", session_id))
        })?;

        let tenant = self.tenants.find_by_id(tenant_id).await?;
        let stripe = self.gateway.retrieve_subscription(&subscription_id).await?;

        let mut update = sync_from_stripe(&stripe, &self.catalog, tenant.tenant_type);
        if let Some(customer_id) = customer_id {
            update.stripe_customer_id = Some(customer_id);
        }

        let updated = self.subscriptions.update(tenant_id, &update).await?;

        tracing::info!(%tenant_id, plan = %updated.plan, status = %updated.status, "Paid subscription started");
        Ok(Some(tenant_id))
    }

    async fn on_subscription_updated(&self, stripe: &StripeSubscription) -> Result<Option<Uuid>> {
        let Some(local) = self.find_local(Some(&stripe.id), Some(&stripe.customer)).await? else {
            tracing::warn!(subscription = %stripe.id, "Stripe subscription has no local counterpart");
            return Ok(None);
        };

        let update = sync_from_stripe(stripe, &self.catalog, local.plan.tenant_type());
        let updated = self.subscriptions.update(local.tenant_id, &update).await?;

        if updated.plan != local.plan || updated.status != local.status {
            tracing::info!(
                tenant_id = %local.tenant_id,
                from_plan = %local.plan,
                to_plan = %updated.plan,
                from_status = %local.status,
                to_status = %updated.status,
                "Subscription synced from Stripe"
            );
        }

        Ok(Some(local.tenant_id))
    }

    async fn on_subscription_deleted(&self, stripe: &StripeSubscription) -> Result<Option<Uuid>> {
        let Some(local) = self.find_local(Some(&stripe.id), None).await? else {
            tracing::warn!(subscription = %stripe.id, "Deleted Stripe subscription has no local counterpart");
            return Ok(None);
        };

        let update = ended_subscription(local.plan.tenant_type(), Utc::now());
        let updated = self.subscriptions.update(local.tenant_id, &update).await?;

        tracing::info!(tenant_id = %local.tenant_id, from = %local.plan, to = %updated.plan, "Subscription ended");
        Ok(Some(local.tenant_id))
    }

    async fn on_invoice(
        &self,
        customer_id: Option<String>,
        subscription_id: Option<String>,
        payment_succeeded: bool,
    ) -> Result<Option<Uuid>> {
        let Some(local) = self
            .find_local(subscription_id.as_deref(), customer_id.as_deref())
            .await?
        else {
            tracing::warn!(customer = ?customer_id, "Invoice for unknown customer");
            return Ok(None);
        };

        let Some(update) = invoice_update(&local, payment_succeeded) else {
            return Ok(Some(local.tenant_id));
        };
        let updated = self.subscriptions.update(local.tenant_id, &update).await?;

        if updated.status != local.status {
            tracing::info!(tenant_id = %local.tenant_id, from = %local.status, to = %updated.status, "Subscription status changed");
        }

        Ok(Some(local.tenant_id))
    }

    async fn notify_payment_failed(&self, tenant_id: Uuid) {
        let (owner, subscription) = match tokio::try_join!(
            self.members.find_owner(tenant_id),
            self.subscriptions.find_by_tenant(tenant_id)
        ) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(%tenant_id, error = %e, "Cannot notify owner about failed payment");
                return;
            }
        };

        let name = format!("{} {}", owner.first_name, owner.last_name);
        let email = EmailMessage::from_template(
            &owner.email,
            Some(name.clone()),
            "Payment failed for your HireHub subscription",
            templates::payment_failed(&name, subscription.plan.display_name(), &self.billing_page()),
        );

        self.mail
            .notify(tenant_id, subscription.effective_plan(), email)
            .await;
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn find_local(
        &self,
        subscription_id: Option<&str>,
        customer_id: Option<&str>,
    ) -> Result<Option<Subscription>> {
        if let Some(id) = subscription_id {
            if let Some(found) = self.subscriptions.find_by_stripe_subscription(id).await? {
                return Ok(Some(found));
            }
        }
        if let Some(id) = customer_id {
            return Ok(self.subscriptions.find_by_stripe_customer(id).await?);
        }
        Ok(None)
    }

    async fn ensure_customer(&self, subscription: Subscription) -> Result<Subscription> {
        let tenant = self.tenants.find_by_id(subscription.tenant_id).await?;
        let owner = self.members.find_owner(tenant.id).await?;

        let customer = self
            .gateway
            .create_customer(&owner.email, &tenant.name, tenant.id)
            .await?;

        tracing::info!(tenant_id = %tenant.id, customer = %customer.id, "Stripe customer created");

        Ok(self
            .subscriptions
            .update(
                tenant.id,
                &UpdateSubscription {
                    stripe_customer_id: Some(customer.id),
                    ..Default::default()
                },
            )
            .await?)
    }

    async fn schedule_cancellation(&self, tenant_id: Uuid) -> Result<Subscription> {
        let updated = self
            .subscriptions
            .update(
                tenant_id,
                &UpdateSubscription {
                    cancel_at_period_end: Some(true),
                    canceled_at: Some(Some(Utc::now())),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(
            %tenant_id,
            plan = %updated.plan,
            ends_at = ?updated.current_period_end,
            "Subscription scheduled to cancel"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stripe::{StripeCustomer, StripeList, StripePrice, SubscriptionItem};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockGateway {
        calls: Mutex<Vec<String>>,
    }

    impl MockGateway {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn subscription(price: &str, cancel: bool) -> StripeSubscription {
            StripeSubscription {
                id: "sub_1".to_string(),
                customer: "cus_1".to_string(),
                status: "active".to_string(),
                cancel_at_period_end: cancel,
                current_period_start: Some(1_700_000_000),
                current_period_end: Some(1_702_592_000),
                items: StripeList {
                    data: vec![SubscriptionItem {
                        id: "si_1".to_string(),
                        price: StripePrice { id: price.to_string() },
                        current_period_start: None,
                        current_period_end: None,
                    }],
                },
                metadata: HashMap::new(),
            }
        }
    }

    #[async_trait]
    impl StripeGateway for MockGateway {
        async fn create_customer(&self, email: &str, _name: &str, _tenant_id: Uuid) -> Result<StripeCustomer> {
            self.calls.lock().unwrap().push(format!("customer:{}", email));
            Ok(StripeCustomer {
                id: "cus_1".to_string(),
                email: Some(email.to_string()),
            })
        }

        async fn create_checkout_session(&self, params: &CheckoutParams) -> Result<CheckoutSession> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("checkout:{}:{}", params.customer_id, params.price_id));
            Ok(CheckoutSession {
                id: "cs_1".to_string(),
                url: Some("https://checkout.stripe.com/c/cs_1".to_string()),
            })
        }

        async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<PortalSession> {
            self.calls.lock().unwrap().push(format!("portal:{}", customer_id));
            Ok(PortalSession {
                id: "bps_1".to_string(),
                url: return_url.to_string(),
            })
        }

        async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription> {
            self.calls.lock().unwrap().push(format!("retrieve:{}", subscription_id));
            Ok(Self::subscription("price_pro_m", false))
        }

        async fn update_subscription_price(
            &self,
            subscription_id: &str,
            item_id: &str,
            price_id: &str,
            proration: Proration,
        ) -> Result<StripeSubscription> {
            self.calls.lock().unwrap().push(format!(
                "price:{}:{}:{}:{:?}",
                subscription_id, item_id, price_id, proration
            ));
            Ok(Self::subscription(price_id, false))
        }

        async fn set_cancel_at_period_end(&self, subscription_id: &str, cancel: bool) -> Result<StripeSubscription> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("cancel:{}:{}", subscription_id, cancel));
            Ok(Self::subscription("price_pro_m", cancel))
        }
    }

    fn catalog() -> PriceCatalog {
        PriceCatalog::new()
            .with_price(PlanTier::Pro, BillingCycle::Monthly, "price_pro_m")
            .with_price(PlanTier::Premium, BillingCycle::Monthly, "price_premium_m")
            .with_price(PlanTier::Business, BillingCycle::Monthly, "price_biz_m")
    }

    fn subscription(plan: PlanTier, stripe_subscription: Option<&str>) -> Subscription {
        Subscription {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            plan,
            status: SubscriptionStatus::Active,
            billing_cycle: BillingCycle::Monthly,
            current_period_start: None,
            current_period_end: None,
            cancel_at_period_end: false,
            canceled_at: None,
            stripe_customer_id: Some("cus_1".to_string()),
            stripe_subscription_id: stripe_subscription.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn request(plan: PlanTier) -> ChangePlanRequest {
        ChangePlanRequest {
            plan,
            billing_cycle: BillingCycle::Monthly,
            success_url: None,
            cancel_url: None,
        }
    }

    #[tokio::test]
    async fn test_checkout_uses_configured_price() {
        let gateway = MockGateway::default();
        let sub = subscription(PlanTier::Free, None);

        let outcome = execute_transition(
            &gateway,
            &catalog(),
            &sub,
            PlanTransition::Checkout,
            &request(PlanTier::Pro),
            "https://app.hirehub.io/dashboard/billing",
        )
        .await
        .unwrap();

        assert!(matches!(outcome, GatewayOutcome::Checkout(ref s) if s.id == "cs_1"));
        assert_eq!(gateway.calls(), vec!["checkout:cus_1:price_pro_m"]);
    }

    #[tokio::test]
    async fn test_upgrade_prorates_and_downgrade_does_not() {
        let gateway = MockGateway::default();
        let sub = subscription(PlanTier::Pro, Some("sub_1"));

        execute_transition(&gateway, &catalog(), &sub, PlanTransition::Upgrade, &request(PlanTier::Premium), "")
            .await
            .unwrap();

        let sub = subscription(PlanTier::Premium, Some("sub_1"));
        execute_transition(&gateway, &catalog(), &sub, PlanTransition::Downgrade, &request(PlanTier::Pro), "")
            .await
            .unwrap();

        assert_eq!(
            gateway.calls(),
            vec![
                "retrieve:sub_1",
                "price:sub_1:si_1:price_premium_m:Immediate",
                "retrieve:sub_1",
                "price:sub_1:si_1:price_pro_m:None",
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_to_free_schedules_cancellation() {
        let gateway = MockGateway::default();
        let sub = subscription(PlanTier::Pro, Some("sub_1"));

        let outcome = execute_transition(
            &gateway,
            &catalog(),
            &sub,
            PlanTransition::CancelToFree,
            &request(PlanTier::Free),
            "",
        )
        .await
        .unwrap();

        assert!(matches!(outcome, GatewayOutcome::CancelScheduled(ref s) if s.cancel_at_period_end));
        assert_eq!(gateway.calls(), vec!["cancel:sub_1:true"]);
    }

    #[tokio::test]
    async fn test_no_change_makes_no_calls() {
        let gateway = MockGateway::default();
        let sub = subscription(PlanTier::Pro, Some("sub_1"));

        let result = execute_transition(&gateway, &catalog(), &sub, PlanTransition::NoChange, &request(PlanTier::Pro), "").await;

        assert!(matches!(result, Err(BillingError::InvalidState(_))));
        assert!(gateway.calls().is_empty());
    }

    #[test]
    fn test_sync_from_stripe_maps_price_to_tier() {
        let stripe = MockGateway::subscription("price_premium_m", true);
        let update = sync_from_stripe(&stripe, &catalog(), TenantType::Candidate);

        assert_eq!(update.plan, Some(PlanTier::Premium));
        assert_eq!(update.status, Some(SubscriptionStatus::Active));
        assert_eq!(update.cancel_at_period_end, Some(true));
        assert_eq!(update.stripe_subscription_id, Some(Some("sub_1".to_string())));
        assert!(update.canceled_at.is_none());
        assert_eq!(update.current_period_end.unwrap().unwrap().timestamp(), 1_702_592_000);
    }

    #[test]
    fn test_sync_from_stripe_keeps_tier_for_foreign_price() {
        let stripe = MockGateway::subscription("price_biz_m", false);
        let update = sync_from_stripe(&stripe, &catalog(), TenantType::Candidate);

        assert_eq!(update.plan, None);
        assert_eq!(update.canceled_at, Some(None));

        let stripe = MockGateway::subscription("price_unknown", false);
        assert_eq!(sync_from_stripe(&stripe, &catalog(), TenantType::Company).plan, None);
    }

    #[test]
    fn test_cancel_only_once_and_only_when_paid() {
        let mut sub = subscription(PlanTier::Pro, Some("sub_1"));
        assert!(ensure_cancellable(&sub).is_ok());

        sub.cancel_at_period_end = true;
        assert!(matches!(ensure_cancellable(&sub), Err(BillingError::InvalidState(_))));

        assert!(ensure_cancellable(&subscription(PlanTier::Free, None)).is_err());
        assert!(ensure_cancellable(&subscription(PlanTier::Pro, None)).is_err());
    }

    #[test]
    fn test_reactivate_only_before_period_end() {
        let now = Utc::now();
        let mut sub = subscription(PlanTier::Pro, Some("sub_1"));

        // Nothing scheduled
        assert!(ensure_reactivatable(&sub, now).is_err());

        sub.cancel_at_period_end = true;
        sub.current_period_end = Some(now + chrono::Duration::days(3));
        assert!(ensure_reactivatable(&sub, now).is_ok());

        sub.current_period_end = Some(now);
        assert!(matches!(ensure_reactivatable(&sub, now), Err(BillingError::InvalidState(_))));

        sub.current_period_end = Some(now - chrono::Duration::days(1));
        assert!(ensure_reactivatable(&sub, now).is_err());
    }

    #[test]
    fn test_ended_subscription_reverts_to_default_tier() {
        let now = Utc::now();

        let candidate = ended_subscription(TenantType::Candidate, now);
        assert_eq!(candidate.plan, Some(PlanTier::Free));
        assert_eq!(candidate.status, Some(SubscriptionStatus::Active));
        assert_eq!(candidate.cancel_at_period_end, Some(false));
        assert_eq!(candidate.canceled_at, Some(Some(now)));
        assert_eq!(candidate.stripe_subscription_id, Some(None));
        assert_eq!(candidate.current_period_end, Some(None));
        // The Stripe customer is kept for a later checkout
        assert_eq!(candidate.stripe_customer_id, None);

        let company = ended_subscription(TenantType::Company, now);
        assert_eq!(company.plan, Some(PlanTier::default_for(TenantType::Company)));
    }

    #[test]
    fn test_invoice_events_move_status() {
        let sub = subscription(PlanTier::Pro, Some("sub_1"));

        let failed = invoice_update(&sub, false).unwrap();
        assert_eq!(failed.status, Some(SubscriptionStatus::PastDue));
        assert_eq!(failed.plan, None);

        let paid = invoice_update(&sub, true).unwrap();
        assert_eq!(paid.status, Some(SubscriptionStatus::Active));

        assert!(invoice_update(&subscription(PlanTier::Free, None), false).is_none());
    }

    mod with_database {
        use super::*;
        use crate::webhook::compute_signature;
        use hirehub_auth::email::{EmailLimitConfig, EmailLimitMonitor, EmailMessage, Mailer, MemoryUsageStore};
        use hirehub_database::{AccountRepository, DatabaseConfig, NewAccount};
        use hirehub_models::NewTenant;

        const SECRET: &str = "whsec_test_secret";

        struct NullMailer;

        #[async_trait]
        impl Mailer for NullMailer {
            async fn send(&self, _email: EmailMessage) -> hirehub_auth::Result<()> {
                Ok(())
            }
        }

        async fn paid_tenant(db: &Database) -> Uuid {
            let slug = format!("billing-{}", &Uuid::new_v4().simple().to_string()[..12]);
            let (tenant, _, _) = AccountRepository::new(db.pool().clone())
                .create_account(&NewAccount {
                    tenant: NewTenant {
                        tenant_type: TenantType::Candidate,
                        name: "Billing Test".to_string(),
                        slug: slug.clone(),
                        website: None,
                    },
                    email: format!("{}@example.com", slug),
                    password_hash: "unused".to_string(),
                    first_name: "Billing".to_string(),
                    last_name: "Test".to_string(),
                    phone: None,
                })
                .await
                .unwrap();

            SubscriptionRepository::new(db.pool().clone())
                .update(
                    tenant.id,
                    &UpdateSubscription {
                        plan: Some(PlanTier::Pro),
                        stripe_customer_id: Some(format!("cus_{}", slug)),
                        stripe_subscription_id: Some(Some(format!("sub_{}", slug))),
                        current_period_end: Some(Some(Utc::now() + chrono::Duration::days(20))),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();

            tenant.id
        }

        fn signed(event: serde_json::Value) -> (Vec<u8>, String) {
            let payload = event.to_string().into_bytes();
            let now = Utc::now().timestamp();
            let header = format!("t={},v1={}", now, compute_signature(SECRET, now, &payload).unwrap());
            (payload, header)
        }

        fn service(db: &Database) -> BillingService {
            let mail = MailDispatcher::new(
                Arc::new(NullMailer),
                EmailLimitMonitor::new(Arc::new(MemoryUsageStore::new()), EmailLimitConfig::default()),
            );
            BillingService::new(
                db,
                Arc::new(MockGateway::default()),
                catalog(),
                mail,
                SECRET.to_string(),
                "http://localhost:8000".to_string(),
            )
        }

        #[tokio::test]
        #[ignore] // Only run with database available
        async fn test_cancel_twice_is_rejected() {
            let db = Database::new(DatabaseConfig::from_env()).await.unwrap();
            db.migrate().await.unwrap();
            let billing = service(&db);
            let tenant_id = paid_tenant(&db).await;

            let canceled = billing.cancel(tenant_id).await.unwrap();
            assert!(canceled.cancel_at_period_end);
            assert!(matches!(billing.cancel(tenant_id).await, Err(BillingError::InvalidState(_))));

            let reactivated = billing.reactivate(tenant_id).await.unwrap();
            assert!(!reactivated.cancel_at_period_end);
        }

        #[tokio::test]
        #[ignore] // Only run with database available
        async fn test_webhook_events_apply_once() {
            let db = Database::new(DatabaseConfig::from_env()).await.unwrap();
            db.migrate().await.unwrap();
            let billing = service(&db);
            let tenant_id = paid_tenant(&db).await;
            let local = SubscriptionRepository::new(db.pool().clone())
                .find_by_tenant(tenant_id)
                .await
                .unwrap();
            let stripe_id = local.stripe_subscription_id.clone().unwrap();

            let event_id = format!("evt_{}", Uuid::new_v4().simple());
            let (payload, header) = signed(serde_json::json!({
                "id": event_id,
                "type": "invoice.payment_failed",
                "data": { "object": {
                    "customer": local.stripe_customer_id,
                    "subscription": stripe_id
                }}
            }));

            assert_eq!(billing.handle_webhook(&payload, &header).await.unwrap(), WebhookOutcome::Processed);
            assert_eq!(billing.handle_webhook(&payload, &header).await.unwrap(), WebhookOutcome::Duplicate);

            let overview = billing.get_subscription(tenant_id).await.unwrap();
            assert_eq!(overview.subscription.status, SubscriptionStatus::PastDue);
            assert_eq!(overview.effective_plan, PlanTier::Free);

            let mut deleted = MockGateway::subscription("price_pro_m", false);
            deleted.id = stripe_id;
            deleted.status = "canceled".to_string();
            let (payload, header) = signed(serde_json::json!({
                "id": format!("evt_{}", Uuid::new_v4().simple()),
                "type": "customer.subscription.deleted",
                "data": { "object": deleted }
            }));

            assert_eq!(billing.handle_webhook(&payload, &header).await.unwrap(), WebhookOutcome::Processed);

            let overview = billing.get_subscription(tenant_id).await.unwrap();
            assert_eq!(overview.subscription.plan, PlanTier::Free);
            assert_eq!(overview.subscription.status, SubscriptionStatus::Active);
            assert!(overview.subscription.stripe_subscription_id.is_none());
        }
    }
}
