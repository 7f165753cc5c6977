use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BackupCode {
    pub id: Uuid,
    pub user_id: Uuid,
    pub code_hash: String,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Which second factor satisfied a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondFactor {
    Totp,
    BackupCode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoFactorSetup {
    pub secret: String,
    pub otpauth_uri: String,
    /// PNG, base64 encoded
    pub qr_code_png: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoFactorStatus {
    pub enabled: bool,
    pub setup_pending: bool,
    pub backup_codes_remaining: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupCodesResponse {
    pub backup_codes: Vec<String>,
}
