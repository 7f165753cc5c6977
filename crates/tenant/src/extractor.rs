use hirehub_database::{DatabaseError, TenantRepository};
use hirehub_models::Tenant;

/// Subdomains that never name a tenant
const RESERVED_SUBDOMAINS: &[&str] = &["www", "app", "api"];

/// Resolves tenants from the request host (`acme.hirehub.io`)
#[derive(Debug, Clone)]
pub struct TenantExtractor {
    app_domain: String,
}

impl TenantExtractor {
    pub fn new(app_domain: impl Into<String>) -> Self {
        Self {
            app_domain: app_domain.into().to_ascii_lowercase(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var("APP_DOMAIN").unwrap_or_else(|_| "hirehub.io".to_string()))
    }

    pub fn app_domain(&self) -> &str {
        &self.app_domain
    }

    /// Tenant slug from a `Host` header. The apex domain, reserved
    /// subdomains, nested subdomains and foreign domains yield `None`.
    pub fn extract_tenant_slug(&self, host: &str) -> Option<String> {
        let host = host.trim().to_ascii_lowercase();
        let host = host.split(':').next().unwrap_or_default();

        let prefix = host.strip_suffix(&self.app_domain)?.strip_suffix('.')?;

        if prefix.is_empty() || prefix.contains('.') || RESERVED_SUBDOMAINS.contains(&prefix) {
            return None;
        }

        Some(prefix.to_string())
    }

    /// Look up the tenant named by the host, if any
    pub async fn resolve(&self, tenants: &TenantRepository, host: &str) -> Result<Option<Tenant>, DatabaseError> {
        let Some(slug) = self.extract_tenant_slug(host) else {
            return Ok(None);
        };

        match tenants.find_by_slug(&slug).await {
            Ok(tenant) => Ok(Some(tenant)),
            Err(e) if e.is_not_found() => {
                tracing::debug!(%slug, "Host names an unknown tenant");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_tenant_slug() {
        let extractor = TenantExtractor::new("hirehub.io");

        assert_eq!(extractor.extract_tenant_slug("acme.hirehub.io"), Some("acme".to_string()));
        assert_eq!(extractor.extract_tenant_slug("Acme.HireHub.io:8443"), Some("acme".to_string()));
        assert_eq!(extractor.extract_tenant_slug("hirehub.io"), None);
        assert_eq!(extractor.extract_tenant_slug("www.hirehub.io"), None);
        assert_eq!(extractor.extract_tenant_slug("app.hirehub.io"), None);
        assert_eq!(extractor.extract_tenant_slug("a.b.hirehub.io"), None);
        assert_eq!(extractor.extract_tenant_slug("acme.example.com"), None);
        assert_eq!(extractor.extract_tenant_slug("evilhirehub.io"), None);
        assert_eq!(extractor.extract_tenant_slug("localhost:3000"), None);
    }
}
