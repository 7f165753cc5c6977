use crate::handlers::ApiError;
use crate::middleware::AuthUser;
use crate::AppState;
use axum::{extract::State, Extension, Json};
use hirehub_models::{UpdateProfile, UserProfile};
use std::sync::Arc;

/// GET /api/profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserProfile>, ApiError> {
    let account = state.auth.load_user(user.principal.user_id).await?;
    Ok(Json(account.into()))
}

/// PATCH /api/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(update): Json<UpdateProfile>,
) -> Result<Json<UserProfile>, ApiError> {
    if update.is_empty() {
        return Err(ApiError::bad_request("No profile fields to update"));
    }

    let profile = state.auth.update_profile(user.principal.user_id, update).await?;
    Ok(Json(profile))
}
