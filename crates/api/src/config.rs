use anyhow::{Context, Result};
use hirehub_cache::CacheConfig;
use hirehub_database::DatabaseConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub base_url: String,
    pub app_domain: String,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub two_factor_issuer: String,
    pub stripe_webhook_secret: String,
    /// Adds `Secure` to dashboard cookies
    pub secure_cookies: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            server_host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .map(|v| v.parse().context("SERVER_PORT must be a port number"))
                .transpose()?
                .unwrap_or(3000),
            secure_cookies: base_url.starts_with("https://"),
            base_url: base_url.trim_end_matches('/').to_string(),
            app_domain: std::env::var("APP_DOMAIN").unwrap_or_else(|_| "hirehub.io".to_string()),
            database: DatabaseConfig::from_env(),
            cache: CacheConfig::from_env(),
            two_factor_issuer: std::env::var("TWO_FACTOR_ISSUER").unwrap_or_else(|_| "HireHub".to_string()),
            stripe_webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET")
                .context("STRIPE_WEBHOOK_SECRET must be set")?,
        })
    }
}
