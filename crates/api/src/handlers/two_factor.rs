use crate::handlers::ApiError;
use crate::middleware::AuthUser;
use crate::AppState;
use axum::{extract::State, http::StatusCode, Extension, Json};
use hirehub_models::{BackupCodesResponse, TwoFactorSetup, TwoFactorStatus};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct DisableTwoFactorRequest {
    pub password: String,
    pub code: String,
}

/// GET /api/2fa/status
pub async fn status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TwoFactorStatus>, ApiError> {
    let account = state.auth.load_user(user.principal.user_id).await?;
    Ok(Json(state.two_factor().status(&account).await?))
}

/// POST /api/2fa/setup
pub async fn setup(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TwoFactorSetup>, ApiError> {
    let account = state.auth.load_user(user.principal.user_id).await?;
    Ok(Json(state.two_factor().begin_setup(&account).await?))
}

/// POST /api/2fa/enable
pub async fn enable(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CodeRequest>,
) -> Result<(StatusCode, Json<BackupCodesResponse>), ApiError> {
    let account = state.auth.load_user(user.principal.user_id).await?;
    let codes = state.two_factor().confirm_setup(&account, &request.code).await?;
    Ok((StatusCode::CREATED, Json(codes)))
}

/// POST /api/2fa/disable
pub async fn disable(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<DisableTwoFactorRequest>,
) -> Result<StatusCode, ApiError> {
    let account = state.auth.load_user(user.principal.user_id).await?;
    state
        .two_factor()
        .disable(&account, &request.password, &request.code)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/2fa/backup-codes
pub async fn regenerate_backup_codes(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CodeRequest>,
) -> Result<Json<BackupCodesResponse>, ApiError> {
    let account = state.auth.load_user(user.principal.user_id).await?;
    let codes = state
        .two_factor()
        .regenerate_backup_codes(&account, &request.code)
        .await?;
    Ok(Json(codes))
}
