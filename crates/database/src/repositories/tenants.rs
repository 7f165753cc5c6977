use crate::error::{DatabaseError, Result};
use hirehub_models::{NewTenant, Tenant, UpdateTenant};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Clone)]
pub struct TenantRepository {
    pool: PgPool,
}

impl TenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a tenant on an existing connection or transaction
    pub async fn insert(conn: &mut PgConnection, new_tenant: &NewTenant) -> Result<Tenant> {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (tenant_type, name, slug, website)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(new_tenant.tenant_type)
        .bind(&new_tenant.name)
        .bind(&new_tenant.slug)
        .bind(&new_tenant.website)
        .fetch_one(&mut *conn)
        .await?;

        Ok(tenant)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Tenant> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Tenant", &id.to_string()))
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Tenant> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Tenant", slug))
    }

    pub async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tenants WHERE slug = $1)")
                .bind(slug)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    /// First free slug among `base`, `base-2`, `base-3`, ...
    pub async fn available_slug(&self, base: &str) -> Result<String> {
        if !self.slug_exists(base).await? {
            return Ok(base.to_string());
        }

        for suffix in 2..100 {
            let candidate = format!("{}-{}", base, suffix);
            if !self.slug_exists(&candidate).await? {
                return Ok(candidate);
            }
        }

        // Crowded base name: fall back to a random suffix
        let random = Uuid::new_v4().simple().to_string();
        Ok(format!("{}-{}", base, &random[..8]))
    }

    pub async fn update(&self, id: Uuid, update: &UpdateTenant) -> Result<Tenant> {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            UPDATE tenants
            SET name = COALESCE($2, name),
                website = COALESCE($3, website),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.website)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Tenant", &id.to_string()))?;

        Ok(tenant)
    }
}
