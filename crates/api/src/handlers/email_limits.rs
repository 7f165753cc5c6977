use crate::handlers::ApiError;
use crate::AppState;
use axum::{extract::State, Json};
use hirehub_authz::{Action, Module};
use hirehub_models::EmailUsageSnapshot;
use hirehub_tenant::TenantContext;
use std::sync::Arc;

/// GET /api/email-limits
pub async fn get_email_limits(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
) -> Result<Json<EmailUsageSnapshot>, ApiError> {
    ctx.require(&state.permissions, Module::Settings, Action::Read)?;

    let snapshot = state.mail.monitor().snapshot(ctx.tenant_id, ctx.plan).await?;
    Ok(Json(snapshot))
}
