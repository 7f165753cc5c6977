use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use hirehub_authz::{AccessContext, Action, AuthzError, Module, PermissionEngine};
use hirehub_models::{PlanTier, Role, TenantType};
use serde::Serialize;
use uuid::Uuid;

/// Tenant of the authenticated request, inserted into the request
/// extensions by the auth middleware.
#[derive(Debug, Clone, Serialize)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub tenant_type: TenantType,
    pub user_id: Uuid,
    pub role: Role,
    pub plan: PlanTier,
}

impl TenantContext {
    pub fn access(&self) -> AccessContext {
        AccessContext {
            tenant_type: self.tenant_type,
            role: self.role,
            plan: self.plan,
        }
    }

    pub fn is_company(&self) -> bool {
        self.tenant_type == TenantType::Company
    }

    pub fn require(&self, engine: &PermissionEngine, module: Module, action: Action) -> Result<(), AuthzError> {
        engine.check(&self.access(), module, action).inspect_err(|e| {
            tracing::debug!(
                tenant_id = %self.tenant_id,
                user_id = %self.user_id,
                permission = %format!("{}:{}", module, action),
                error = %e,
                "Permission denied"
            );
        })
    }
}

/// Returned when a handler asks for a tenant on an unauthenticated route
#[derive(Debug)]
pub struct MissingTenantContext;

impl IntoResponse for MissingTenantContext {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "unauthorized",
                "message": "Authentication required"
            })),
        )
            .into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = MissingTenantContext;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .ok_or(MissingTenantContext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn context(role: Role, plan: PlanTier) -> TenantContext {
        TenantContext {
            tenant_id: Uuid::new_v4(),
            tenant_type: plan.tenant_type(),
            user_id: Uuid::new_v4(),
            role,
            plan,
        }
    }

    #[tokio::test]
    async fn test_extracts_from_extensions() {
        let ctx = context(Role::Admin, PlanTier::Business);
        let (mut parts, _) = Request::builder()
            .extension(ctx.clone())
            .body(())
            .unwrap()
            .into_parts();

        let extracted = TenantContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(extracted.tenant_id, ctx.tenant_id);
        assert_eq!(extracted.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_missing_context_is_unauthorized() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();

        let rejection = TenantContext::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(rejection.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_require_uses_role_and_plan() {
        let engine = PermissionEngine::new();

        let viewer = context(Role::Viewer, PlanTier::Business);
        assert!(viewer.require(&engine, Module::Jobs, Action::Read).is_ok());
        assert!(viewer.require(&engine, Module::Team, Action::Manage).is_err());

        let candidate = context(Role::Owner, PlanTier::Free);
        assert!(!candidate.is_company());
        assert!(matches!(
            candidate.require(&engine, Module::Jobs, Action::Read),
            Err(AuthzError::ModuleUnavailable { .. })
        ));
    }
}
