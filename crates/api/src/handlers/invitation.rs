use crate::handlers::auth::ClientMeta;
use crate::handlers::ApiError;
use crate::middleware::AuthUser;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use hirehub_auth::AuthTokens;
use hirehub_authz::{Action, Module};
use hirehub_models::{AcceptInvitation, CreateInvitation, Invitation};
use hirehub_tenant::TenantContext;
use std::sync::Arc;
use uuid::Uuid;

/// POST /api/tenant/invitations
pub async fn create_invitation(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ctx: TenantContext,
    Json(request): Json<CreateInvitation>,
) -> Result<(StatusCode, Json<Invitation>), ApiError> {
    ctx.require(&state.permissions, Module::Team, Action::Manage)?;

    let invitation = state.invitations.create(&user.principal, request).await?;
    Ok((StatusCode::CREATED, Json(invitation)))
}

/// GET /api/tenant/invitations
pub async fn list_invitations(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
) -> Result<Json<Vec<Invitation>>, ApiError> {
    ctx.require(&state.permissions, Module::Team, Action::Read)?;
    Ok(Json(state.invitations.list_pending(ctx.tenant_id).await?))
}

/// DELETE /api/tenant/invitations/:id
pub async fn revoke_invitation(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(invitation_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    ctx.require(&state.permissions, Module::Team, Action::Manage)?;

    state.invitations.revoke(ctx.tenant_id, invitation_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/invitations/accept
pub async fn accept_invitation(
    State(state): State<Arc<AppState>>,
    ClientMeta(meta): ClientMeta,
    Json(request): Json<AcceptInvitation>,
) -> Result<(StatusCode, Json<AuthTokens>), ApiError> {
    let tokens = state.invitations.accept(request, meta).await?;
    Ok((StatusCode::CREATED, Json(tokens)))
}
