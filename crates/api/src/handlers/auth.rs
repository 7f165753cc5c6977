use crate::handlers::ApiError;
use crate::middleware::{rate_limit::client_ip, AuthUser};
use crate::AppState;
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    Extension, Json,
};
use hirehub_auth::{
    AccountOverview, AuthResponse, AuthTokens, LoginRequest, RefreshTokenRequest,
    RegisterCandidateRequest, RegisterCompanyRequest, SecondFactorVerified, SessionMeta,
    TwoFactorLoginRequest,
};
use hirehub_models::ChangePassword;
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

/// Client IP and user agent, recorded on new sessions
pub struct ClientMeta(pub SessionMeta);

pub fn session_meta(headers: &HeaderMap, peer: Option<SocketAddr>) -> SessionMeta {
    SessionMeta {
        ip_address: Some(client_ip(headers, peer)),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(String::from),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientMeta(session_meta(&parts.headers, peer)))
    }
}

#[derive(Debug, Serialize)]
pub struct TwoFactorLoginResponse {
    #[serde(flatten)]
    pub tokens: AuthTokens,
    pub second_factor: SecondFactorVerified,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

/// POST /api/auth/register/candidate
pub async fn register_candidate(
    State(state): State<Arc<AppState>>,
    ClientMeta(meta): ClientMeta,
    Json(request): Json<RegisterCandidateRequest>,
) -> Result<(StatusCode, Json<AuthTokens>), ApiError> {
    let tokens = state.auth.register_candidate(request, meta).await?;
    Ok((StatusCode::CREATED, Json(tokens)))
}

/// POST /api/auth/register/company
pub async fn register_company(
    State(state): State<Arc<AppState>>,
    ClientMeta(meta): ClientMeta,
    Json(request): Json<RegisterCompanyRequest>,
) -> Result<(StatusCode, Json<AuthTokens>), ApiError> {
    let tokens = state.auth.register_company(request, meta).await?;
    Ok((StatusCode::CREATED, Json(tokens)))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientMeta(meta): ClientMeta,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let response = state.auth.login(request, meta).await?;
    Ok(Json(response))
}

/// POST /api/auth/2fa/verify
pub async fn verify_two_factor(
    State(state): State<Arc<AppState>>,
    ClientMeta(meta): ClientMeta,
    Json(request): Json<TwoFactorLoginRequest>,
) -> Result<Json<TwoFactorLoginResponse>, ApiError> {
    let (tokens, second_factor) = state.auth.complete_two_factor_login(request, meta).await?;
    Ok(Json(TwoFactorLoginResponse { tokens, second_factor }))
}

/// POST /api/auth/refresh
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ClientMeta(meta): ClientMeta,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<Json<AuthTokens>, ApiError> {
    let tokens = state.auth.refresh(&request.refresh_token, meta).await?;
    Ok(Json(tokens))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<StatusCode, ApiError> {
    state.auth.logout(&user.access_token).await?;
    tracing::debug!(user_id = %user.principal.user_id, "Logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<AccountOverview>, ApiError> {
    let overview = state.auth.me(user.principal.user_id).await?;
    Ok(Json(overview))
}

/// POST /api/auth/change-password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<ChangePassword>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.auth.change_password(&user.principal, request).await?;
    Ok(MessageResponse::new("Password changed. Other sessions have been signed out."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_meta() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8.4"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.4"));

        let meta = session_meta(&headers, None);
        assert_eq!(meta.ip_address.as_deref(), Some("198.51.100.4"));
        assert_eq!(meta.user_agent.as_deref(), Some("curl/8.4"));
    }
}
