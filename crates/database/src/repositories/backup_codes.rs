use crate::error::Result;
use hirehub_models::BackupCode;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct BackupCodeRepository {
    pool: PgPool,
}

impl BackupCodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Replace every backup code of a user with a fresh set of hashes
    pub async fn replace_all(&self, user_id: Uuid, code_hashes: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM two_factor_backup_codes WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for hash in code_hashes {
            sqlx::query("INSERT INTO two_factor_backup_codes (user_id, code_hash) VALUES ($1, $2)")
                .bind(user_id)
                .bind(hash)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn list_unused(&self, user_id: Uuid) -> Result<Vec<BackupCode>> {
        let codes = sqlx::query_as::<_, BackupCode>(
            "SELECT * FROM two_factor_backup_codes WHERE user_id = $1 AND used_at IS NULL",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(codes)
    }

    pub async fn count_unused(&self, user_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM two_factor_backup_codes WHERE user_id = $1 AND used_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Mark a code as used. Returns `false` if it was consumed concurrently.
    pub async fn mark_used(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE two_factor_backup_codes SET used_at = NOW() WHERE id = $1 AND used_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_all(&self, user_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM two_factor_backup_codes WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
