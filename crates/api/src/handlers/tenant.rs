use crate::handlers::ApiError;
use crate::middleware::AuthUser;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use hirehub_authz::{Action, Module, Permission};
use hirehub_models::{Tenant, TenantMember, TenantMemberWithUser, UpdateMemberRole, UpdateTenant};
use hirehub_tenant::TenantContext;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct TenantResponse {
    #[serde(flatten)]
    pub tenant: Tenant,
    pub role: hirehub_models::Role,
    pub plan: hirehub_models::PlanTier,
    pub permissions: Vec<Permission>,
}

/// GET /api/tenant
pub async fn get_tenant(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
) -> Result<Json<TenantResponse>, ApiError> {
    ctx.require(&state.permissions, Module::Settings, Action::Read)?;

    let tenant = state.tenants.find_by_id(ctx.tenant_id).await?;
    Ok(Json(TenantResponse {
        tenant,
        role: ctx.role,
        plan: ctx.plan,
        permissions: state.permissions.effective_permissions(&ctx.access()),
    }))
}

/// PATCH /api/tenant
pub async fn update_tenant(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Json(update): Json<UpdateTenant>,
) -> Result<Json<Tenant>, ApiError> {
    ctx.require(&state.permissions, Module::Settings, Action::Write)?;
    update
        .validate()
        .map_err(|e| ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", &e.to_string()))?;

    let tenant = state.tenants.update(ctx.tenant_id, &update).await?;
    tracing::info!(tenant_id = %tenant.id, "Tenant settings updated");
    Ok(Json(tenant))
}

/// GET /api/tenant/members
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
) -> Result<Json<Vec<TenantMemberWithUser>>, ApiError> {
    ctx.require(&state.permissions, Module::Team, Action::Read)?;
    Ok(Json(state.team.list(ctx.tenant_id).await?))
}

/// PUT /api/tenant/members/:user_id/role
pub async fn update_member_role(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ctx: TenantContext,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateMemberRole>,
) -> Result<Json<TenantMember>, ApiError> {
    ctx.require(&state.permissions, Module::Team, Action::Manage)?;

    let member = state
        .team
        .change_role(&user.principal, user_id, request.role)
        .await?;
    Ok(Json(member))
}

/// DELETE /api/tenant/members/:user_id
pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ctx: TenantContext,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    ctx.require(&state.permissions, Module::Team, Action::Delete)?;

    state.team.remove(&user.principal, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
