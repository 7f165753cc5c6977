use crate::handlers::ApiError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use hirehub_auth::Principal;
use hirehub_tenant::TenantContext;
use std::sync::Arc;

/// Authenticated caller, available to handlers as `Extension<AuthUser>`
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub principal: Principal,
    pub access_token: String,
}

impl AuthUser {
    pub fn tenant_context(&self) -> TenantContext {
        TenantContext {
            tenant_id: self.principal.tenant_id,
            tenant_type: self.principal.tenant_type,
            user_id: self.principal.user_id,
            role: self.principal.role,
            plan: self.principal.plan,
        }
    }
}

/// Token from an `Authorization: Bearer ...` header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("missing_auth_header", "Authorization header is required"))?
        .to_str()
        .map_err(|_| ApiError::unauthorized("invalid_auth_header", "Invalid Authorization header format"))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            ApiError::unauthorized("invalid_auth_scheme", "Authorization header must use Bearer scheme")
        })
}

/// Validate the bearer token and attach `AuthUser` and `TenantContext`
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())?.to_string();

    let principal = state.auth.authenticate(&token).await.map_err(|e| {
        tracing::debug!(error = %e, "Authentication failed");
        ApiError::from(e)
    })?;

    let user = AuthUser {
        principal,
        access_token: token,
    };

    request.extensions_mut().insert(user.tenant_context());
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
