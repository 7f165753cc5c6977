use crate::error::{DatabaseError, Result};
use hirehub_models::{Role, TenantMember, TenantMemberWithUser};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Clone)]
pub struct MemberRepository {
    pool: PgPool,
}

impl MemberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Add a membership on an existing connection or transaction
    pub async fn add(conn: &mut PgConnection, tenant_id: Uuid, user_id: Uuid, role: Role) -> Result<TenantMember> {
        let member = sqlx::query_as::<_, TenantMember>(
            r#"
            INSERT INTO tenant_members (tenant_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(&mut *conn)
        .await?;

        Ok(member)
    }

    /// Membership of a user inside a tenant
    pub async fn find(&self, tenant_id: Uuid, user_id: Uuid) -> Result<TenantMember> {
        sqlx::query_as::<_, TenantMember>(
            "SELECT * FROM tenant_members WHERE tenant_id = $1 AND user_id = $2",
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Member", &user_id.to_string()))
    }

    /// List members of a tenant with their user details
    pub async fn list_with_users(&self, tenant_id: Uuid) -> Result<Vec<TenantMemberWithUser>> {
        let members = sqlx::query_as::<_, TenantMemberWithUser>(
            r#"
            SELECT u.id AS user_id, u.email, u.first_name, u.last_name,
                   m.role, u.two_factor_enabled, u.last_login_at, m.created_at
            FROM tenant_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.tenant_id = $1
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    pub async fn count(&self, tenant_id: Uuid) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM tenant_members WHERE tenant_id = $1")
                .bind(tenant_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    pub async fn update_role(&self, tenant_id: Uuid, user_id: Uuid, role: Role) -> Result<TenantMember> {
        sqlx::query_as::<_, TenantMember>(
            r#"
            UPDATE tenant_members
            SET role = $3
            WHERE tenant_id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Member", &user_id.to_string()))
    }

    /// Remove a member. The user row goes with it since users belong to a
    /// single tenant.
    pub async fn remove(&self, tenant_id: Uuid, user_id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1 AND tenant_id = $2")
            .bind(user_id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Member", &user_id.to_string()));
        }

        Ok(())
    }

    /// Owner of a tenant (exactly one per tenant)
    pub async fn find_owner(&self, tenant_id: Uuid) -> Result<TenantMemberWithUser> {
        sqlx::query_as::<_, TenantMemberWithUser>(
            r#"
            SELECT u.id AS user_id, u.email, u.first_name, u.last_name,
                   m.role, u.two_factor_enabled, u.last_login_at, m.created_at
            FROM tenant_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.tenant_id = $1 AND m.role = 'owner'
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Tenant owner", &tenant_id.to_string()))
    }
}
