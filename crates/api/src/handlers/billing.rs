use crate::handlers::ApiError;
use crate::AppState;
use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use hirehub_authz::{Action, Module};
use hirehub_billing::{PortalSession, WebhookOutcome};
use hirehub_models::{ChangePlanRequest, ChangePlanResponse, PlanInfo, Subscription, SubscriptionOverview};
use hirehub_tenant::TenantContext;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct PortalRequest {
    pub return_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub received: bool,
    pub outcome: WebhookOutcome,
}

/// GET /api/billing/plans
///
/// Plans offered to the caller's tenant type.
pub async fn list_plans(State(state): State<Arc<AppState>>, ctx: TenantContext) -> Json<Vec<PlanInfo>> {
    Json(state.billing.list_plans(ctx.tenant_type))
}

/// GET /api/billing/subscription
pub async fn get_subscription(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
) -> Result<Json<SubscriptionOverview>, ApiError> {
    ctx.require(&state.permissions, Module::Billing, Action::Read)?;
    Ok(Json(state.billing.get_subscription(ctx.tenant_id).await?))
}

/// POST /api/billing/change-plan
pub async fn change_plan(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Json(request): Json<ChangePlanRequest>,
) -> Result<Json<ChangePlanResponse>, ApiError> {
    ctx.require(&state.permissions, Module::Billing, Action::Manage)?;
    Ok(Json(state.billing.change_plan(ctx.tenant_id, request).await?))
}

/// POST /api/billing/cancel
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
) -> Result<Json<Subscription>, ApiError> {
    ctx.require(&state.permissions, Module::Billing, Action::Manage)?;
    Ok(Json(state.billing.cancel(ctx.tenant_id).await?))
}

/// POST /api/billing/reactivate
pub async fn reactivate(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
) -> Result<Json<Subscription>, ApiError> {
    ctx.require(&state.permissions, Module::Billing, Action::Manage)?;
    Ok(Json(state.billing.reactivate(ctx.tenant_id).await?))
}

/// POST /api/billing/portal
pub async fn create_portal_session(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    request: Option<Json<PortalRequest>>,
) -> Result<Json<PortalSession>, ApiError> {
    ctx.require(&state.permissions, Module::Billing, Action::Manage)?;

    let return_url = request.and_then(|Json(r)| r.return_url);
    let session = state
        .billing
        .create_portal_session(ctx.tenant_id, return_url)
        .await?;
    Ok(Json(session))
}

/// POST /api/billing/webhook
///
/// Called by Stripe. The raw body is needed for signature verification.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("Missing Stripe-Signature header"))?;

    let outcome = state.billing.handle_webhook(&body, signature).await.map_err(|e| {
        tracing::warn!(error = %e, "Stripe webhook rejected");
        ApiError::from(e)
    })?;

    Ok(Json(WebhookResponse {
        received: true,
        outcome,
    }))
}
