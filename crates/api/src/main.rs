// HireHub API server

mod config;
mod handlers;
mod middleware;
mod routes;

use anyhow::Context;
use config::Config;
use dotenvy::dotenv;
use hirehub_auth::{
    AuthService, EmailLimitConfig, EmailLimitMonitor, EmailService, InvitationService, JwtService,
    MailDispatcher, SecretCipher, TeamService, TwoFactorService,
};
use hirehub_auth::email::RedisUsageStore;
use hirehub_authz::PermissionEngine;
use hirehub_billing::{BillingService, PriceCatalog, StripeClient};
use hirehub_cache::Cache;
use hirehub_database::{Database, TenantRepository};
use hirehub_tenant::TenantExtractor;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

pub struct AppState {
    pub auth: AuthService,
    pub invitations: InvitationService,
    pub team: TeamService,
    pub billing: BillingService,
    pub mail: MailDispatcher,
    pub permissions: PermissionEngine,
    pub tenants: TenantRepository,
    pub tenant_extractor: TenantExtractor,
    pub database: Database,
    pub cache: Arc<Cache>,
    pub secure_cookies: bool,
}

impl AppState {
    pub fn two_factor(&self) -> &TwoFactorService {
        self.auth.two_factor()
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hirehub_api=debug,tower_http=debug"));

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting HireHub API server");

    let config = Config::from_env()?;

    let database = Database::new(config.database.clone())
        .await
        .context("Failed to connect to database")?;
    database.ping().await.context("Database ping failed")?;
    database.migrate().await.context("Failed to run migrations")?;
    tracing::info!("Database connected and migrated");

    let cache = Cache::new(config.cache.clone())
        .await
        .context("Failed to connect to Redis")?;
    cache.ping().await.context("Redis ping failed")?;
    tracing::info!("Redis connected");

    // Email and limits
    let email_service = EmailService::from_env()?;
    let monitor = EmailLimitMonitor::new(
        Arc::new(RedisUsageStore::new(cache.clone())),
        EmailLimitConfig::from_env(),
    );
    let mail = MailDispatcher::new(Arc::new(email_service), monitor);

    // Authentication
    let jwt = JwtService::from_env()?;
    let cipher = SecretCipher::from_env()?;
    let two_factor = TwoFactorService::new(&database, cipher, config.two_factor_issuer.clone(), mail.clone());
    let auth = AuthService::new(&database, jwt, two_factor, mail.clone(), config.base_url.clone());
    let invitations = InvitationService::new(&database, auth.clone(), mail.clone(), config.base_url.clone());
    let team = TeamService::new(&database);

    // Billing
    let billing = BillingService::new(
        &database,
        Arc::new(StripeClient::from_env()?),
        PriceCatalog::from_env(),
        mail.clone(),
        config.stripe_webhook_secret.clone(),
        config.base_url.clone(),
    );
    tracing::info!("Services initialized");

    let state = Arc::new(AppState {
        auth,
        invitations,
        team,
        billing,
        mail,
        permissions: PermissionEngine::new(),
        tenants: TenantRepository::new(database.pool().clone()),
        tenant_extractor: TenantExtractor::new(config.app_domain.clone()),
        database,
        cache: Arc::new(cache),
        secure_cookies: config.secure_cookies,
    });

    let app = routes::create_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
    );

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!(%addr, base_url = %config.base_url, "Server ready");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
