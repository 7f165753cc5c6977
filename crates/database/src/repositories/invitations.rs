use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use hirehub_models::{Invitation, Role};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Clone)]
pub struct InvitationRepository {
    pool: PgPool,
}

impl InvitationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        tenant_id: Uuid,
        email: &str,
        role: Role,
        token_hash: &str,
        invited_by: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<Invitation> {
        let invitation = sqlx::query_as::<_, Invitation>(
            r#"
            INSERT INTO invitations (tenant_id, email, role, token_hash, invited_by, expires_at)
            VALUES ($1, LOWER($2), $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(email)
        .bind(role)
        .bind(token_hash)
        .bind(invited_by)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(invitation)
    }

    pub async fn find_by_token_hash(&self, token_hash: &str) -> Result<Invitation> {
        sqlx::query_as::<_, Invitation>("SELECT * FROM invitations WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("Invitation not found".to_string()))
    }

    /// Pending (not accepted, not expired) invitations of a tenant
    pub async fn list_pending(&self, tenant_id: Uuid) -> Result<Vec<Invitation>> {
        let invitations = sqlx::query_as::<_, Invitation>(
            r#"
            SELECT * FROM invitations
            WHERE tenant_id = $1 AND accepted_at IS NULL AND expires_at > NOW()
            ORDER BY created_at DESC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(invitations)
    }

    pub async fn count_pending(&self, tenant_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM invitations
            WHERE tenant_id = $1 AND accepted_at IS NULL AND expires_at > NOW()
            "#,
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    pub async fn pending_exists(&self, tenant_id: Uuid, email: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM invitations
                WHERE tenant_id = $1 AND email = LOWER($2)
                  AND accepted_at IS NULL AND expires_at > NOW()
            )
            "#,
        )
        .bind(tenant_id)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Mark an invitation accepted. Returns `false` if it already was.
    pub async fn mark_accepted(conn: &mut PgConnection, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE invitations SET accepted_at = NOW() WHERE id = $1 AND accepted_at IS NULL",
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Revoke a pending invitation
    pub async fn revoke(&self, tenant_id: Uuid, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "DELETE FROM invitations WHERE id = $1 AND tenant_id = $2 AND accepted_at IS NULL",
        )
        .bind(id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Invitation", &id.to_string()));
        }

        Ok(())
    }
}
