use crate::handlers;
use crate::middleware;
use crate::AppState;
use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use hirehub_auth::invitation::ACCEPT_INVITATION_PATH;
use std::sync::Arc;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(public_api(&state))
        .merge(protected_api(&state))
        .merge(dashboard(&state))
        .with_state(state)
}

/// Unauthenticated API routes. Credential endpoints are rate limited per IP.
fn public_api(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/auth/register/candidate",
            post(handlers::auth::register_candidate).layer(from_fn_with_state(
                state.cache.clone(),
                middleware::rate_limit_registration,
            )),
        )
        .route(
            "/api/auth/register/company",
            post(handlers::auth::register_company).layer(from_fn_with_state(
                state.cache.clone(),
                middleware::rate_limit_registration,
            )),
        )
        .route(
            "/api/auth/login",
            post(handlers::auth::login)
                .layer(from_fn_with_state(state.cache.clone(), middleware::rate_limit_login)),
        )
        .route(
            "/api/auth/2fa/verify",
            post(handlers::auth::verify_two_factor).layer(from_fn_with_state(
                state.cache.clone(),
                middleware::rate_limit_two_factor,
            )),
        )
        .route("/api/auth/refresh", post(handlers::auth::refresh))
        .route(
            "/api/invitations/accept",
            post(handlers::invitation::accept_invitation).layer(from_fn_with_state(
                state.cache.clone(),
                middleware::rate_limit_registration,
            )),
        )
        // Stripe webhooks are authenticated by signature
        .route("/api/billing/webhook", post(handlers::billing::stripe_webhook))
}

/// Routes behind bearer authentication. Module permissions are checked in
/// the handlers against the caller's `TenantContext`.
fn protected_api(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        // Session
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/me", get(handlers::auth::me))
        .route("/api/auth/change-password", post(handlers::auth::change_password))
        // Two-factor authentication
        .route("/api/2fa/status", get(handlers::two_factor::status))
        .route("/api/2fa/setup", post(handlers::two_factor::setup))
        .route("/api/2fa/enable", post(handlers::two_factor::enable))
        .route("/api/2fa/disable", post(handlers::two_factor::disable))
        .route(
            "/api/2fa/backup-codes",
            post(handlers::two_factor::regenerate_backup_codes),
        )
        // Profile
        .route(
            "/api/profile",
            get(handlers::profile::get_profile).patch(handlers::profile::update_profile),
        )
        // Tenant and team
        .route(
            "/api/tenant",
            get(handlers::tenant::get_tenant).patch(handlers::tenant::update_tenant),
        )
        .route("/api/tenant/members", get(handlers::tenant::list_members))
        .route(
            "/api/tenant/members/:user_id/role",
            put(handlers::tenant::update_member_role),
        )
        .route(
            "/api/tenant/members/:user_id",
            delete(handlers::tenant::remove_member),
        )
        .route(
            "/api/tenant/invitations",
            post(handlers::invitation::create_invitation).get(handlers::invitation::list_invitations),
        )
        .route(
            "/api/tenant/invitations/:id",
            delete(handlers::invitation::revoke_invitation),
        )
        // Billing
        .route("/api/billing/plans", get(handlers::billing::list_plans))
        .route("/api/billing/subscription", get(handlers::billing::get_subscription))
        .route("/api/billing/change-plan", post(handlers::billing::change_plan))
        .route("/api/billing/cancel", post(handlers::billing::cancel))
        .route("/api/billing/reactivate", post(handlers::billing::reactivate))
        .route("/api/billing/portal", post(handlers::billing::create_portal_session))
        // Email limits
        .route("/api/email-limits", get(handlers::email_limits::get_email_limits))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth))
}

/// Server-rendered pages. The access token travels in an HttpOnly cookie.
fn dashboard(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    use handlers::dashboard as pages;

    Router::new()
        .route(
            "/sign-in",
            get(pages::sign_in_page).merge(
                post(pages::sign_in_submit)
                    .layer(from_fn_with_state(state.cache.clone(), middleware::rate_limit_login)),
            ),
        )
        .route(
            "/sign-up",
            get(pages::sign_up_page).merge(post(pages::sign_up_submit).layer(
                from_fn_with_state(state.cache.clone(), middleware::rate_limit_registration),
            )),
        )
        // Target of the emailed invitation link
        .route(
            ACCEPT_INVITATION_PATH,
            get(pages::accept_invitation_page).merge(post(pages::accept_invitation_submit).layer(
                from_fn_with_state(state.cache.clone(), middleware::rate_limit_registration),
            )),
        )
        .route("/sign-in/2fa", get(pages::two_factor_page))
        .route(
            "/sign-in/2fa/verify",
            post(pages::two_factor_submit).layer(from_fn_with_state(
                state.cache.clone(),
                middleware::rate_limit_two_factor,
            )),
        )
        .route("/sign-out", get(pages::sign_out))
        .route("/dashboard", get(pages::dashboard_page))
        .route("/dashboard/profile", post(pages::update_profile_submit))
        .route("/dashboard/security", get(pages::security_page))
        .route("/dashboard/security/setup", post(pages::security_setup))
        .route("/dashboard/security/enable", post(pages::security_enable))
        .route("/dashboard/security/disable", post(pages::security_disable))
        .route("/dashboard/billing", get(pages::billing_page))
        .route("/dashboard/billing/change", post(pages::billing_change_plan))
        .route("/dashboard/billing/cancel", post(pages::billing_cancel))
        .route("/dashboard/billing/reactivate", post(pages::billing_reactivate))
        .route("/dashboard/billing/portal", post(pages::billing_portal))
}
