use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Unique constraint on `tenants.slug`
pub const TENANT_SLUG_CONSTRAINT: &str = "tenants_slug_key";

/// Case-insensitive unique index on `users.email`
pub const USER_EMAIL_CONSTRAINT: &str = "users_email_lower_idx";

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database error: {0}")]
    Sqlx(sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Other(String),
}

impl DatabaseError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound(format!("{} with id {} not found", entity, id))
    }

    pub fn duplicate(entity: &str, field: &str) -> Self {
        Self::DuplicateEntry(format!("{} with {} already exists", entity, field))
    }

    pub fn unique_violation(constraint: &str) -> Self {
        Self::DuplicateEntry(format!("violates {}", constraint))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether this is a unique violation of the named constraint or index
    pub fn violates(&self, constraint: &str) -> bool {
        matches!(self, Self::DuplicateEntry(msg) if msg.strip_prefix("violates ") == Some(constraint))
    }
}

// Unique violations get their own variant so callers can answer 409
impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return Self::unique_violation(db_err.constraint().unwrap_or("unique constraint"));
            }
        }
        Self::Sqlx(err)
    }
}
