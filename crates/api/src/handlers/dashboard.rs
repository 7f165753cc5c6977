use crate::handlers::auth::ClientMeta;
use crate::handlers::ApiError;
use crate::middleware::AuthUser;
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use hirehub_auth::invitation::ACCEPT_INVITATION_PATH;
use hirehub_auth::{
    AuthResponse, AuthTokens, LoginRequest, RegisterCandidateRequest, RegisterCompanyRequest,
    TwoFactorLoginRequest,
};
use hirehub_authz::{Action, Module};
use hirehub_models::{
    AcceptInvitation, BillingCycle, ChangePlanRequest, ChangePlanResponse, EmailUsageSnapshot, PlanInfo, PlanTier,
    SecondFactor, TenantType, TwoFactorSetup, UpdateProfile, UsageCounter,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

const ACCESS_COOKIE: &str = "hirehub_access";
const CHALLENGE_COOKIE: &str = "hirehub_challenge";

// ============================================================================
// TEMPLATE STRUCTS
// ============================================================================

// Askama templates take plain Strings and bools rather than Options.

#[derive(Template)]
#[template(path = "sign_in.html")]
struct SignInTemplate {
    tenant_name: String,
    has_tenant: bool,
    notice: String,
    has_notice: bool,
    error: String,
    has_error: bool,
}

#[derive(Template)]
#[template(path = "sign_up.html")]
struct SignUpTemplate {
    is_company: bool,
    error: String,
    has_error: bool,
}

#[derive(Template)]
#[template(path = "accept_invitation.html")]
struct AcceptInvitationTemplate {
    token: String,
    has_token: bool,
    error: String,
    has_error: bool,
}

#[derive(Template)]
#[template(path = "two_factor.html")]
struct TwoFactorTemplate {
    error: String,
    has_error: bool,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    full_name: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    headline: String,
    location: String,
    tenant_name: String,
    tenant_type: String,
    role: String,
    plan_name: String,
    is_company: bool,
    two_factor_enabled: bool,
    notice: String,
    has_notice: bool,
    error: String,
    has_error: bool,
}

#[derive(Template)]
#[template(path = "security.html")]
struct SecurityTemplate {
    enabled: bool,
    setup_pending: bool,
    backup_codes_remaining: i64,
    has_setup: bool,
    secret: String,
    otpauth_uri: String,
    qr_data_uri: String,
    backup_codes: Vec<String>,
    has_backup_codes: bool,
    notice: String,
    has_notice: bool,
    error: String,
    has_error: bool,
}

struct PlanCard {
    tier: String,
    name: String,
    monthly_price: String,
    yearly_price: String,
    is_current: bool,
    is_free: bool,
    highlights: Vec<String>,
}

struct UsageRow {
    label: String,
    used: u64,
    limit: String,
    level: String,
}

#[derive(Template)]
#[template(path = "billing.html")]
struct BillingTemplate {
    plan_name: String,
    status: String,
    billing_cycle: String,
    period_end: String,
    has_period_end: bool,
    cancel_at_period_end: bool,
    can_manage: bool,
    has_billing_account: bool,
    plans: Vec<PlanCard>,
    usage: Vec<UsageRow>,
    can_send_email: bool,
    notice: String,
    has_notice: bool,
    error: String,
    has_error: bool,
}

// ============================================================================
// QUERY/FORM STRUCTS
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct FlashQuery {
    pub notice: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignUpQuery {
    #[serde(rename = "type")]
    pub account_type: Option<TenantType>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignUpForm {
    pub account_type: TenantType,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub first_name: String,
    pub last_name: String,
    pub company_name: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InvitationQuery {
    pub token: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AcceptInvitationForm {
    pub token: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Deserialize)]
pub struct CodeForm {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct DisableForm {
    pub password: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub headline: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePlanForm {
    pub plan: PlanTier,
    #[serde(default)]
    pub billing_cycle: BillingCycle,
}

// ============================================================================
// SIGN IN / SIGN UP
// ============================================================================

/// GET /sign-in
pub async fn sign_in_page(
    State(state): State<Arc<AppState>>,
    Query(flash): Query<FlashQuery>,
    headers: HeaderMap,
) -> Response {
    if current_user(&state, &headers).await.is_some() {
        return Redirect::to("/dashboard").into_response();
    }

    // Company subdomains show the company name
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();
    let tenant_name = match state.tenant_extractor.resolve(&state.tenants, host).await {
        Ok(tenant) => tenant.map(|t| t.name),
        Err(e) => {
            error!(error = %e, "Failed to resolve tenant from host");
            None
        }
    };

    render(SignInTemplate {
        has_tenant: tenant_name.is_some(),
        tenant_name: tenant_name.unwrap_or_default(),
        has_notice: flash.notice.is_some(),
        notice: flash.notice.unwrap_or_default(),
        has_error: flash.error.is_some(),
        error: flash.error.unwrap_or_default(),
    })
}

/// POST /sign-in
pub async fn sign_in_submit(
    State(state): State<Arc<AppState>>,
    ClientMeta(meta): ClientMeta,
    Form(form): Form<SignInForm>,
) -> Response {
    let request = LoginRequest {
        email: form.email.trim().to_lowercase(),
        password: form.password,
    };

    match state.auth.login(request, meta).await {
        Ok(AuthResponse::Success(tokens)) => signed_in(&state, &tokens),
        Ok(AuthResponse::TwoFactorRequired {
            challenge_token,
            expires_in,
        }) => {
            let response = Redirect::to("/sign-in/2fa").into_response();
            with_cookie(
                response,
                &cookie(CHALLENGE_COOKIE, &challenge_token, expires_in, state.secure_cookies),
            )
        }
        Err(e) => fail("/sign-in", e),
    }
}

/// GET /sign-up?type=candidate|company
pub async fn sign_up_page(Query(query): Query<SignUpQuery>) -> Response {
    render(SignUpTemplate {
        is_company: query.account_type == Some(TenantType::Company),
        has_error: query.error.is_some(),
        error: query.error.unwrap_or_default(),
    })
}

/// POST /sign-up
pub async fn sign_up_submit(
    State(state): State<Arc<AppState>>,
    ClientMeta(meta): ClientMeta,
    Form(form): Form<SignUpForm>,
) -> Response {
    let back = format!("/sign-up?type={}", form.account_type);

    if form.password != form.password_confirm {
        return redirect_with_error(&back, "Passwords do not match");
    }

    let email = form.email.trim().to_lowercase();
    let result = match form.account_type {
        TenantType::Candidate => {
            state
                .auth
                .register_candidate(
                    RegisterCandidateRequest {
                        email,
                        password: form.password,
                        first_name: form.first_name,
                        last_name: form.last_name,
                        phone: None,
                    },
                    meta,
                )
                .await
        }
        TenantType::Company => {
            let Some(company_name) = non_empty(form.company_name) else {
                return redirect_with_error(&back, "Company name is required");
            };

            state
                .auth
                .register_company(
                    RegisterCompanyRequest {
                        company_name,
                        website: non_empty(form.website),
                        email,
                        password: form.password,
                        first_name: form.first_name,
                        last_name: form.last_name,
                    },
                    meta,
                )
                .await
        }
    };

    match result {
        Ok(tokens) => signed_in(&state, &tokens),
        Err(e) => fail(&back, e),
    }
}

/// GET /invitations/accept?token=...
pub async fn accept_invitation_page(Query(query): Query<InvitationQuery>) -> Response {
    let token = non_empty(query.token);

    render(AcceptInvitationTemplate {
        has_token: token.is_some(),
        token: token.unwrap_or_default(),
        has_error: query.error.is_some(),
        error: query.error.unwrap_or_default(),
    })
}

/// POST /invitations/accept
pub async fn accept_invitation_submit(
    State(state): State<Arc<AppState>>,
    ClientMeta(meta): ClientMeta,
    Form(form): Form<AcceptInvitationForm>,
) -> Response {
    let back = accept_invitation_url(&form.token);

    if form.password != form.password_confirm {
        return redirect_with_error(&back, "Passwords do not match");
    }

    let request = AcceptInvitation {
        token: form.token.trim().to_string(),
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
        password: form.password,
    };

    match state.invitations.accept(request, meta).await {
        Ok(tokens) => {
            info!(user_id = %tokens.user.id, tenant_id = %tokens.tenant_id, "Invitation accepted");
            signed_in(&state, &tokens)
        }
        Err(e) => fail(&back, e),
    }
}

fn accept_invitation_url(token: &str) -> String {
    format!(
        "{}?token={}",
        ACCEPT_INVITATION_PATH,
        urlencoding::encode(token.trim())
    )
}

/// GET /sign-in/2fa
pub async fn two_factor_page(Query(flash): Query<FlashQuery>, headers: HeaderMap) -> Response {
    if read_cookie(&headers, CHALLENGE_COOKIE).is_none() {
        return redirect_with_error("/sign-in", "Your sign-in attempt expired. Please sign in again.");
    }

    render(TwoFactorTemplate {
        has_error: flash.error.is_some(),
        error: flash.error.unwrap_or_default(),
    })
}

/// POST /sign-in/2fa
pub async fn two_factor_submit(
    State(state): State<Arc<AppState>>,
    ClientMeta(meta): ClientMeta,
    headers: HeaderMap,
    Form(form): Form<CodeForm>,
) -> Response {
    let Some(challenge_token) = read_cookie(&headers, CHALLENGE_COOKIE) else {
        return redirect_with_error("/sign-in", "Your sign-in attempt expired. Please sign in again.");
    };

    let request = TwoFactorLoginRequest {
        challenge_token: challenge_token.to_string(),
        code: form.code,
    };

    match state.auth.complete_two_factor_login(request, meta).await {
        Ok((tokens, verified)) => {
            let response = if verified.factor == SecondFactor::BackupCode {
                redirect_with_notice(
                    "/dashboard/security",
                    &format!(
                        "Signed in with a backup code. {} backup codes left.",
                        verified.backup_codes_remaining
                    ),
                )
            } else {
                Redirect::to("/dashboard").into_response()
            };

            let response = with_cookie(response, &clear_cookie(CHALLENGE_COOKIE, state.secure_cookies));
            with_cookie(
                response,
                &cookie(ACCESS_COOKIE, &tokens.access_token, tokens.expires_in, state.secure_cookies),
            )
        }
        Err(e) => fail("/sign-in/2fa", e),
    }
}

/// GET /sign-out
pub async fn sign_out(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(token) = read_cookie(&headers, ACCESS_COOKIE) {
        if let Err(e) = state.auth.logout(token).await {
            error!(error = %e, "Failed to revoke session on sign-out");
        }
    }

    let response = redirect_with_notice("/sign-in", "You have been signed out.");
    with_cookie(response, &clear_cookie(ACCESS_COOKIE, state.secure_cookies))
}

// ============================================================================
// DASHBOARD
// ============================================================================

/// GET /dashboard
pub async fn dashboard_page(
    State(state): State<Arc<AppState>>,
    Query(flash): Query<FlashQuery>,
    headers: HeaderMap,
) -> Response {
    let Some(user) = current_user(&state, &headers).await else {
        return Redirect::to("/sign-in").into_response();
    };

    let overview = match state.auth.me(user.principal.user_id).await {
        Ok(overview) => overview,
        Err(e) => {
            error!(error = %e, "Failed to load account");
            return redirect_with_error("/sign-in", "Unable to load your account.");
        }
    };

    let profile = overview.user;
    render(DashboardTemplate {
        full_name: format!("{} {}", profile.first_name, profile.last_name),
        first_name: profile.first_name,
        last_name: profile.last_name,
        email: profile.email,
        phone: profile.phone.unwrap_or_default(),
        headline: profile.headline.unwrap_or_default(),
        location: profile.location.unwrap_or_default(),
        is_company: overview.tenant.is_company(),
        tenant_name: overview.tenant.name,
        tenant_type: overview.tenant.tenant_type.to_string(),
        role: overview.role.to_string(),
        plan_name: overview.effective_plan.display_name().to_string(),
        two_factor_enabled: profile.two_factor_enabled,
        has_notice: flash.notice.is_some(),
        notice: flash.notice.unwrap_or_default(),
        has_error: flash.error.is_some(),
        error: flash.error.unwrap_or_default(),
    })
}

/// POST /dashboard/profile
pub async fn update_profile_submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<ProfileForm>,
) -> Response {
    let Some(user) = current_user(&state, &headers).await else {
        return Redirect::to("/sign-in").into_response();
    };

    let update = UpdateProfile {
        first_name: non_empty(Some(form.first_name)),
        last_name: non_empty(Some(form.last_name)),
        phone: non_empty(form.phone),
        headline: non_empty(form.headline),
        location: non_empty(form.location),
    };

    match state.auth.update_profile(user.principal.user_id, update).await {
        Ok(_) => redirect_with_notice("/dashboard", "Profile updated."),
        Err(e) => fail("/dashboard", e),
    }
}

// ============================================================================
// SECURITY
// ============================================================================

/// GET /dashboard/security
pub async fn security_page(
    State(state): State<Arc<AppState>>,
    Query(flash): Query<FlashQuery>,
    headers: HeaderMap,
) -> Response {
    let Some(user) = current_user(&state, &headers).await else {
        return Redirect::to("/sign-in").into_response();
    };

    render_security(&state, &user, None, Vec::new(), flash).await
}

/// POST /dashboard/security/setup
pub async fn security_setup(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let Some(user) = current_user(&state, &headers).await else {
        return Redirect::to("/sign-in").into_response();
    };

    let setup = match state.auth.load_user(user.principal.user_id).await {
        Ok(account) => state.two_factor().begin_setup(&account).await,
        Err(e) => Err(e),
    };

    match setup {
        Ok(setup) => render_security(&state, &user, Some(setup), Vec::new(), FlashQuery::default()).await,
        Err(e) => fail("/dashboard/security", e),
    }
}

/// POST /dashboard/security/enable
pub async fn security_enable(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<CodeForm>,
) -> Response {
    let Some(user) = current_user(&state, &headers).await else {
        return Redirect::to("/sign-in").into_response();
    };

    let codes = match state.auth.load_user(user.principal.user_id).await {
        Ok(account) => state.two_factor().confirm_setup(&account, &form.code).await,
        Err(e) => Err(e),
    };

    match codes {
        Ok(codes) => {
            let flash = FlashQuery {
                notice: Some("Two-factor authentication is on. Store these backup codes somewhere safe.".to_string()),
                error: None,
            };
            render_security(&state, &user, None, codes.backup_codes, flash).await
        }
        Err(e) => fail("/dashboard/security", e),
    }
}

/// POST /dashboard/security/disable
pub async fn security_disable(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<DisableForm>,
) -> Response {
    let Some(user) = current_user(&state, &headers).await else {
        return Redirect::to("/sign-in").into_response();
    };

    let result = match state.auth.load_user(user.principal.user_id).await {
        Ok(account) => {
            state
                .two_factor()
                .disable(&account, &form.password, &form.code)
                .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => redirect_with_notice("/dashboard/security", "Two-factor authentication disabled."),
        Err(e) => fail("/dashboard/security", e),
    }
}

async fn render_security(
    state: &AppState,
    user: &AuthUser,
    setup: Option<TwoFactorSetup>,
    backup_codes: Vec<String>,
    flash: FlashQuery,
) -> Response {
    let status = match state.auth.load_user(user.principal.user_id).await {
        Ok(account) => state.two_factor().status(&account).await,
        Err(e) => Err(e),
    };
    let status = match status {
        Ok(status) => status,
        Err(e) => {
            error!(error = %e, "Failed to load two-factor status");
            return redirect_with_error("/dashboard", "Unable to load security settings.");
        }
    };

    let (secret, otpauth_uri, qr_data_uri) = setup
        .as_ref()
        .map(|s| {
            (
                s.secret.clone(),
                s.otpauth_uri.clone(),
                format!("data:image/png;base64,{}", s.qr_code_png),
            )
        })
        .unwrap_or_default();

    render(SecurityTemplate {
        enabled: status.enabled,
        setup_pending: status.setup_pending,
        backup_codes_remaining: status.backup_codes_remaining,
        has_setup: setup.is_some(),
        secret,
        otpauth_uri,
        qr_data_uri,
        has_backup_codes: !backup_codes.is_empty(),
        backup_codes,
        has_notice: flash.notice.is_some(),
        notice: flash.notice.unwrap_or_default(),
        has_error: flash.error.is_some(),
        error: flash.error.unwrap_or_default(),
    })
}

// ============================================================================
// BILLING
// ============================================================================

/// GET /dashboard/billing
pub async fn billing_page(
    State(state): State<Arc<AppState>>,
    Query(flash): Query<FlashQuery>,
    headers: HeaderMap,
) -> Response {
    let Some(user) = current_user(&state, &headers).await else {
        return Redirect::to("/sign-in").into_response();
    };

    let ctx = user.tenant_context();
    if let Err(e) = ctx.require(&state.permissions, Module::Billing, Action::Read) {
        return fail("/dashboard", e);
    }
    let can_manage = state
        .permissions
        .is_allowed(&ctx.access(), Module::Billing, Action::Manage);

    let overview = match state.billing.get_subscription(ctx.tenant_id).await {
        Ok(overview) => overview,
        Err(e) => {
            error!(error = %e, tenant_id = %ctx.tenant_id, "Failed to load subscription");
            return redirect_with_error("/dashboard", "Unable to load billing details.");
        }
    };

    let usage = match state.mail.monitor().snapshot(ctx.tenant_id, ctx.plan).await {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            error!(error = %e, "Failed to load email usage");
            None
        }
    };

    let subscription = &overview.subscription;
    let plans = state
        .billing
        .list_plans(ctx.tenant_type)
        .into_iter()
        .map(|plan| plan_card(plan, overview.effective_plan))
        .collect();

    render(BillingTemplate {
        plan_name: overview.effective_plan.display_name().to_string(),
        status: subscription.status.to_string(),
        billing_cycle: subscription.billing_cycle.to_string(),
        has_period_end: subscription.current_period_end.is_some(),
        period_end: subscription
            .current_period_end
            .map(|end| end.format("%B %-d, %Y").to_string())
            .unwrap_or_default(),
        cancel_at_period_end: subscription.cancel_at_period_end,
        can_manage,
        has_billing_account: subscription.stripe_customer_id.is_some(),
        plans,
        can_send_email: usage.as_ref().map_or(true, |u| u.can_send),
        usage: usage.map(usage_rows).unwrap_or_default(),
        has_notice: flash.notice.is_some(),
        notice: flash.notice.unwrap_or_default(),
        has_error: flash.error.is_some(),
        error: flash.error.unwrap_or_default(),
    })
}

/// POST /dashboard/billing/change
pub async fn billing_change_plan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<ChangePlanForm>,
) -> Response {
    let Some(user) = current_user(&state, &headers).await else {
        return Redirect::to("/sign-in").into_response();
    };

    let ctx = user.tenant_context();
    if let Err(e) = ctx.require(&state.permissions, Module::Billing, Action::Manage) {
        return fail("/dashboard/billing", e);
    }

    let request = ChangePlanRequest {
        plan: form.plan,
        billing_cycle: form.billing_cycle,
        success_url: None,
        cancel_url: None,
    };

    match state.billing.change_plan(ctx.tenant_id, request).await {
        Ok(ChangePlanResponse::CheckoutRequired { checkout_url, .. }) => {
            Redirect::to(&checkout_url).into_response()
        }
        Ok(ChangePlanResponse::Upgraded { subscription }) => redirect_with_notice(
            "/dashboard/billing",
            &format!("Upgraded to {}.", subscription.plan.display_name()),
        ),
        Ok(ChangePlanResponse::Downgraded { subscription }) => redirect_with_notice(
            "/dashboard/billing",
            &format!(
                "Switched to {}. The new price applies from your next billing cycle.",
                subscription.plan.display_name()
            ),
        ),
        Ok(ChangePlanResponse::ScheduledCancellation { .. }) => redirect_with_notice(
            "/dashboard/billing",
            "Your paid plan will end at the close of the current billing period.",
        ),
        Err(e) => fail("/dashboard/billing", e),
    }
}

/// POST /dashboard/billing/cancel
pub async fn billing_cancel(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let Some(user) = current_user(&state, &headers).await else {
        return Redirect::to("/sign-in").into_response();
    };

    let ctx = user.tenant_context();
    if let Err(e) = ctx.require(&state.permissions, Module::Billing, Action::Manage) {
        return fail("/dashboard/billing", e);
    }

    match state.billing.cancel(ctx.tenant_id).await {
        Ok(_) => redirect_with_notice("/dashboard/billing", "Subscription will cancel at period end."),
        Err(e) => fail("/dashboard/billing", e),
    }
}

/// POST /dashboard/billing/reactivate
pub async fn billing_reactivate(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let Some(user) = current_user(&state, &headers).await else {
        return Redirect::to("/sign-in").into_response();
    };

    let ctx = user.tenant_context();
    if let Err(e) = ctx.require(&state.permissions, Module::Billing, Action::Manage) {
        return fail("/dashboard/billing", e);
    }

    match state.billing.reactivate(ctx.tenant_id).await {
        Ok(_) => redirect_with_notice("/dashboard/billing", "Subscription reactivated."),
        Err(e) => fail("/dashboard/billing", e),
    }
}

/// POST /dashboard/billing/portal
pub async fn billing_portal(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let Some(user) = current_user(&state, &headers).await else {
        return Redirect::to("/sign-in").into_response();
    };

    let ctx = user.tenant_context();
    if let Err(e) = ctx.require(&state.permissions, Module::Billing, Action::Manage) {
        return fail("/dashboard/billing", e);
    }

    match state.billing.create_portal_session(ctx.tenant_id, None).await {
        Ok(session) => Redirect::to(&session.url).into_response(),
        Err(e) => fail("/dashboard/billing", e),
    }
}

fn plan_card(plan: PlanInfo, current: PlanTier) -> PlanCard {
    let mut highlights = Vec::new();
    let limits = plan.limits;

    if plan.tenant_type == TenantType::Company {
        highlights.push(quota("job postings", limits.job_postings));
        highlights.push(quota("team seats", limits.team_seats));
    } else {
        highlights.push(quota("applications / month", limits.applications_per_month));
    }
    highlights.push(quota("emails / month", limits.emails_per_month));

    let features = plan.features;
    for (enabled, label) in [
        (features.analytics, "Analytics"),
        (features.ai_matching, "AI matching"),
        (features.priority_listing, "Priority listing"),
        (features.ats_integration, "ATS integration"),
        (features.api_access, "API access"),
        (features.custom_branding, "Custom branding"),
        (features.sso, "SSO"),
    ] {
        if enabled {
            highlights.push(label.to_string());
        }
    }

    PlanCard {
        tier: plan.tier.as_str().to_string(),
        name: plan.name,
        monthly_price: format_price(plan.monthly_price_cents),
        yearly_price: format_price(plan.yearly_price_cents),
        is_current: plan.tier == current,
        is_free: plan.tier.is_free(),
        highlights,
    }
}

fn quota(label: &str, limit: Option<u32>) -> String {
    match limit {
        Some(n) => format!("{} {}", n, label),
        None => format!("Unlimited {}", label),
    }
}

fn format_price(cents: u32) -> String {
    if cents == 0 {
        "Free".to_string()
    } else {
        format!("${}.{:02}", cents / 100, cents % 100)
    }
}

fn usage_rows(snapshot: EmailUsageSnapshot) -> Vec<UsageRow> {
    let row = |label: String, counter: &UsageCounter| UsageRow {
        label,
        used: counter.used,
        limit: counter
            .limit
            .map(|l| l.to_string())
            .unwrap_or_else(|| "unlimited".to_string()),
        level: format!("{:?}", counter.level).to_lowercase(),
    };

    vec![
        row(format!("Emails this month ({})", snapshot.period), &snapshot.tenant),
        row("Platform sending budget today".to_string(), &snapshot.provider),
    ]
}

// ============================================================================
// HELPERS
// ============================================================================

fn render<T: Template>(template: T) -> Response {
    Html(template.render().unwrap_or_else(|e| {
        error!("Template render error: {}", e);
        "Error rendering page".to_string()
    }))
    .into_response()
}

fn signed_in(state: &AppState, tokens: &AuthTokens) -> Response {
    info!(user_id = %tokens.user.id, tenant_id = %tokens.tenant_id, "Dashboard sign-in");
    let response = Redirect::to("/dashboard").into_response();
    with_cookie(
        response,
        &cookie(ACCESS_COOKIE, &tokens.access_token, tokens.expires_in, state.secure_cookies),
    )
}

async fn current_user(state: &AppState, headers: &HeaderMap) -> Option<AuthUser> {
    let token = read_cookie(headers, ACCESS_COOKIE)?;
    let principal = state.auth.authenticate(token).await.ok()?;

    Some(AuthUser {
        principal,
        access_token: token.to_string(),
    })
}

pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

pub fn cookie(name: &str, value: &str, max_age: i64, secure: bool) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        name,
        value,
        max_age.max(0),
        if secure { "; Secure" } else { "" }
    )
}

fn clear_cookie(name: &str, secure: bool) -> String {
    cookie(name, "", 0, secure)
}

fn with_cookie(mut response: Response, cookie: &str) -> Response {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => error!(error = %e, "Invalid Set-Cookie value"),
    }
    response
}

fn redirect_with_error(path: &str, error: &str) -> Response {
    Redirect::to(&with_query(path, "error", error)).into_response()
}

/// Append an encoded query parameter to a path that may already have a query
fn with_query(path: &str, key: &str, value: &str) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", path, separator, key, urlencoding::encode(value))
}

/// Redirect back with the user-facing message of a domain error
fn fail(path: &str, err: impl Into<ApiError>) -> Response {
    let err: ApiError = err.into();
    redirect_with_error(path, &err.body.message)
}

fn redirect_with_notice(path: &str, notice: &str) -> Response {
    Redirect::to(&with_query(path, "notice", notice)).into_response()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; hirehub_access=abc.def; hirehub_challenge="),
        );

        assert_eq!(read_cookie(&headers, ACCESS_COOKIE), Some("abc.def"));
        assert_eq!(read_cookie(&headers, CHALLENGE_COOKIE), None);
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_cookie_attributes() {
        let value = cookie(ACCESS_COOKIE, "tok", 3600, true);
        assert_eq!(value, "hirehub_access=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=3600; Secure");

        let cleared = clear_cookie(ACCESS_COOKIE, false);
        assert!(cleared.contains("Max-Age=0"));
        assert!(!cleared.contains("Secure"));
    }

    #[test]
    fn test_accept_invitation_url_keeps_token() {
        assert_eq!(accept_invitation_url("ab12"), "/invitations/accept?token=ab12");
        assert_eq!(
            accept_invitation_url(" a&b "),
            "/invitations/accept?token=a%26b"
        );

        let back = redirect_with_error(&accept_invitation_url("ab12"), "Token expired");
        assert_eq!(
            back.headers().get(header::LOCATION).unwrap(),
            "/invitations/accept?token=ab12&error=Token%20expired"
        );
    }

    #[tokio::test]
    async fn test_accept_invitation_page_carries_token() {
        let response = accept_invitation_page(Query(InvitationQuery {
            token: Some("ab12".to_string()),
            error: None,
        }))
        .await;
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();

        assert!(html.contains(r#"action="/invitations/accept""#));
        assert!(html.contains(r#"name="token" value="ab12""#));

        let response = accept_invitation_page(Query(InvitationQuery {
            token: None,
            error: None,
        }))
        .await;
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(!html.contains(r#"name="token""#));
    }

    #[test]
    fn test_with_query_extends_existing_query() {
        assert_eq!(with_query("/sign-in", "notice", "Signed out"), "/sign-in?notice=Signed%20out");
        assert_eq!(
            with_query("/sign-up?type=company", "error", "Email taken"),
            "/sign-up?type=company&error=Email%20taken"
        );
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(0), "Free");
        assert_eq!(format_price(1900), "$19.00");
        assert_eq!(format_price(4999), "$49.99");
    }

    #[test]
    fn test_plan_card_marks_current_plan() {
        let card = plan_card(PlanTier::Business.info(), PlanTier::Business);
        assert!(card.is_current);
        assert!(!card.is_free);
        assert!(card.highlights.iter().any(|h| h.contains("team seats")));

        let free = plan_card(PlanTier::Free.info(), PlanTier::Business);
        assert!(free.is_free);
        assert!(!free.is_current);
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(Some(" Berlin ".to_string())), Some("Berlin".to_string()));
        assert_eq!(non_empty(None), None);
    }
}
