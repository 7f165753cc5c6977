use crate::error::{DatabaseError, Result};
use hirehub_models::user::UpdateProfile;
use hirehub_models::{NewUser, User};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a user on an existing connection or transaction
    pub async fn insert(conn: &mut PgConnection, new_user: &NewUser, password_hash: &str) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (tenant_id, email, password_hash, first_name, last_name, phone)
            VALUES ($1, LOWER($2), $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(new_user.tenant_id)
        .bind(&new_user.email)
        .bind(password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.phone)
        .fetch_one(&mut *conn)
        .await?;

        Ok(user)
    }

    /// Find user by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<User> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("User", &id.to_string()))?;

        Ok(user)
    }

    /// Find user by email (case-insensitive, emails are globally unique)
    pub async fn find_by_email(&self, email: &str) -> Result<User> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("User", email))?;

        Ok(user)
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Update profile fields that are present in the request
    pub async fn update_profile(&self, id: Uuid, update: &UpdateProfile) -> Result<User> {
        if update.is_empty() {
            return self.find_by_id(id).await;
        }

        let mut query_builder = sqlx::QueryBuilder::new("UPDATE users SET updated_at = NOW()");

        if let Some(ref first_name) = update.first_name {
            query_builder.push(", first_name = ");
            query_builder.push_bind(first_name);
        }

        if let Some(ref last_name) = update.last_name {
            query_builder.push(", last_name = ");
            query_builder.push_bind(last_name);
        }

        if let Some(ref phone) = update.phone {
            query_builder.push(", phone = ");
            query_builder.push_bind(phone);
        }

        if let Some(ref headline) = update.headline {
            query_builder.push(", headline = ");
            query_builder.push_bind(headline);
        }

        if let Some(ref location) = update.location {
            query_builder.push(", location = ");
            query_builder.push_bind(location);
        }

        query_builder.push(" WHERE id = ");
        query_builder.push_bind(id);
        query_builder.push(" RETURNING *");

        let user = query_builder
            .build_query_as::<User>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("User", &id.to_string()))?;

        Ok(user)
    }

    /// Update password hash
    pub async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Update last login timestamp
    pub async fn update_last_login(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE users SET last_login_at = NOW(), updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Two-factor state
    // ------------------------------------------------------------------

    /// Store an encrypted secret awaiting confirmation
    pub async fn set_pending_two_factor_secret(&self, id: Uuid, encrypted_secret: &str) -> Result<()> {
        sqlx::query(
            "UPDATE users SET two_factor_pending_secret = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(encrypted_secret)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Promote the pending secret and enable two-factor authentication.
    /// `step` is the TOTP step of the confirming code.
    pub async fn enable_two_factor(&self, id: Uuid, step: i64) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET two_factor_enabled = true,
                two_factor_secret = two_factor_pending_secret,
                two_factor_pending_secret = NULL,
                two_factor_last_step = $2,
                updated_at = NOW()
            WHERE id = $1 AND two_factor_pending_secret IS NOT NULL
            "#,
        )
        .bind(id)
        .bind(step)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(
                "No pending two-factor setup".to_string(),
            ));
        }

        Ok(())
    }

    pub async fn disable_two_factor(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET two_factor_enabled = false,
                two_factor_secret = NULL,
                two_factor_pending_secret = NULL,
                two_factor_last_step = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record the TOTP step just accepted. Returns false when an equal or
    /// later step was already recorded, i.e. the code is being replayed.
    pub async fn advance_two_factor_step(&self, id: Uuid, step: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET two_factor_last_step = $2
            WHERE id = $1 AND (two_factor_last_step IS NULL OR two_factor_last_step < $2)
            "#,
        )
        .bind(id)
        .bind(step)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
