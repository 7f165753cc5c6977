use thiserror::Error;

pub type Result<T> = std::result::Result<T, BillingError>;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("Payment required: {0}")]
    PaymentRequired(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Stripe error ({status}): {message}")]
    Stripe { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Webhook timestamp outside the tolerance window")]
    SignatureExpired,

    #[error("Malformed webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(#[from] hirehub_database::DatabaseError),
}

impl From<reqwest::Error> for BillingError {
    fn from(err: reqwest::Error) -> Self {
        BillingError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for BillingError {
    fn from(err: serde_json::Error) -> Self {
        BillingError::InvalidPayload(err.to_string())
    }
}
