use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hirehub_auth::AuthError;
use hirehub_authz::AuthzError;
use hirehub_billing::BillingError;
use hirehub_database::DatabaseError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}

/// Error returned by JSON handlers, rendered as `{ "error", "message" }`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, error: &str, message: &str) -> Self {
        Self {
            status,
            body: ErrorResponse::new(error, message),
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn unauthorized(error: &str, message: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error, message)
    }

    pub fn forbidden(message: &str) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    fn internal(error: &dyn std::fmt::Display) -> Self {
        tracing::error!(error = %error, "Internal error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "An internal error occurred",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match &err {
            DatabaseError::NotFound(msg) => Self::new(StatusCode::NOT_FOUND, "not_found", msg),
            DatabaseError::DuplicateEntry(msg) => Self::new(StatusCode::CONFLICT, "conflict", msg),
            DatabaseError::InvalidInput(msg) => Self::bad_request(msg),
            _ => Self::internal(&err),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        let status = match err {
            AuthzError::PlanUpgradeRequired { .. } => StatusCode::PAYMENT_REQUIRED,
            _ => StatusCode::FORBIDDEN,
        };
        Self::new(status, err.code(), &err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::InvalidCredentials => Self::unauthorized("invalid_credentials", &message),
            AuthError::UserNotFound => Self::new(StatusCode::NOT_FOUND, "user_not_found", &message),
            AuthError::UserInactive => Self::new(StatusCode::FORBIDDEN, "user_inactive", &message),
            AuthError::InvalidTwoFactorCode => Self::unauthorized("invalid_two_factor_code", &message),
            AuthError::TwoFactorAlreadyEnabled => {
                Self::new(StatusCode::CONFLICT, "two_factor_already_enabled", &message)
            }
            AuthError::TwoFactorNotEnabled => {
                Self::new(StatusCode::BAD_REQUEST, "two_factor_not_enabled", &message)
            }
            AuthError::TwoFactorSetupMissing => {
                Self::new(StatusCode::BAD_REQUEST, "two_factor_setup_missing", &message)
            }
            AuthError::InvalidToken(_) | AuthError::Jwt(_) => Self::unauthorized("invalid_token", &message),
            AuthError::TokenExpired => Self::unauthorized("token_expired", &message),
            AuthError::WeakPassword(_) => Self::new(StatusCode::UNPROCESSABLE_ENTITY, "weak_password", &message),
            AuthError::Validation(_) => Self::new(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", &message),
            AuthError::EmailTaken => Self::new(StatusCode::CONFLICT, "email_taken", &message),
            AuthError::SeatLimitReached { .. } => {
                Self::new(StatusCode::PAYMENT_REQUIRED, "seat_limit_reached", &message)
            }
            AuthError::EmailLimitReached(_) => {
                Self::new(StatusCode::TOO_MANY_REQUESTS, "email_limit_reached", &message)
            }
            AuthError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "not_found", &message),
            AuthError::Forbidden(_) => Self::forbidden(&message),
            AuthError::Authz(e) => e.into(),
            AuthError::Database(e) => e.into(),
            AuthError::Cache(_)
            | AuthError::PasswordHash(_)
            | AuthError::Encryption(_)
            | AuthError::Email(_)
            | AuthError::Configuration(_)
            | AuthError::Internal(_) => Self::internal(&message),
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        let message = err.to_string();
        match err {
            BillingError::InvalidPlan(_) => Self::new(StatusCode::BAD_REQUEST, "invalid_plan", &message),
            BillingError::InvalidState(_) => Self::new(StatusCode::CONFLICT, "invalid_state", &message),
            BillingError::PaymentRequired(_) => {
                Self::new(StatusCode::PAYMENT_REQUIRED, "payment_required", &message)
            }
            BillingError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "not_found", &message),
            BillingError::InvalidSignature(_) | BillingError::SignatureExpired => {
                Self::new(StatusCode::BAD_REQUEST, "invalid_signature", &message)
            }
            BillingError::InvalidPayload(_) => Self::bad_request(&message),
            BillingError::Stripe { .. } | BillingError::Http(_) => {
                tracing::error!(error = %message, "Stripe call failed");
                Self::new(StatusCode::BAD_GATEWAY, "billing_provider_error", "Billing provider unavailable")
            }
            BillingError::Database(e) => e.into(),
            BillingError::Configuration(_) => Self::internal(&message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hirehub_authz::Module;
    use hirehub_models::PlanTier;

    #[test]
    fn test_auth_error_status_codes() {
        assert_eq!(ApiError::from(AuthError::InvalidCredentials).status, StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(AuthError::EmailTaken).status, StatusCode::CONFLICT);
        assert_eq!(ApiError::from(AuthError::TokenExpired).body.error, "token_expired");

        let seats = ApiError::from(AuthError::SeatLimitReached {
            plan: "Startup".to_string(),
            limit: 3,
        });
        assert_eq!(seats.status, StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err = ApiError::from(AuthError::Encryption("bad nonce".to_string()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.body.message.contains("nonce"));
    }

    #[test]
    fn test_nested_errors_keep_their_status() {
        let err = ApiError::from(AuthError::Database(DatabaseError::not_found("User", "42")));
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = ApiError::from(AuthzError::PlanUpgradeRequired {
            module: Module::Analytics,
            plan: PlanTier::Startup,
        });
        assert_eq!(err.status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(err.body.error, "plan_upgrade_required");
    }

    #[test]
    fn test_billing_error_status_codes() {
        assert_eq!(ApiError::from(BillingError::SignatureExpired).status, StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(BillingError::Stripe {
                status: 500,
                message: "boom".to_string()
            })
            .status,
            StatusCode::BAD_GATEWAY
        );
    }
}
