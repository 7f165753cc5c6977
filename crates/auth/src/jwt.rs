use crate::error::{AuthError, Result};
use chrono::{Duration, Utc};
use hirehub_models::{PlanTier, Role, TenantType};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TWO_FACTOR_CHALLENGE_MINUTES: i64 = 5;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,            // User ID
    pub email: String,
    pub tenant_id: String,
    pub tenant_type: TenantType,
    pub role: Role,
    pub plan: PlanTier,         // Plan at issue time; refreshed on token rotation
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub token_type: TokenType,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AuthError::InvalidToken("Invalid subject".to_string()))
    }

    pub fn tenant_uuid(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.tenant_id)
            .map_err(|_| AuthError::InvalidToken("Invalid tenant".to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
    TwoFactorChallenge,
}

/// Who a token is issued to
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub user_id: Uuid,
    pub email: String,
    pub tenant_id: Uuid,
    pub tenant_type: TenantType,
    pub role: Role,
    pub plan: PlanTier,
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    access_token_exp_minutes: i64,
    refresh_token_exp_days: i64,
}

impl JwtService {
    pub fn new(secret: &str, access_token_exp_minutes: i64, refresh_token_exp_days: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm: Algorithm::HS256,
            access_token_exp_minutes,
            refresh_token_exp_days,
        }
    }

    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| AuthError::Configuration("JWT_SECRET must be set".to_string()))?;

        let access_token_exp_minutes = std::env::var("JWT_EXPIRATION_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        let refresh_token_exp_days = std::env::var("REFRESH_TOKEN_EXPIRATION_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Ok(Self::new(&secret, access_token_exp_minutes, refresh_token_exp_days))
    }

    /// Access token lifetime in seconds
    pub fn access_token_ttl(&self) -> i64 {
        self.access_token_exp_minutes * 60
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::days(self.refresh_token_exp_days)
    }

    pub fn generate_access_token(&self, subject: &TokenSubject) -> Result<String> {
        self.issue(subject, TokenType::Access, Duration::minutes(self.access_token_exp_minutes))
    }

    pub fn generate_refresh_token(&self, subject: &TokenSubject) -> Result<String> {
        self.issue(subject, TokenType::Refresh, Duration::days(self.refresh_token_exp_days))
    }

    /// Short-lived token proving the password step of a two-factor login
    pub fn generate_two_factor_challenge(&self, subject: &TokenSubject) -> Result<String> {
        self.issue(
            subject,
            TokenType::TwoFactorChallenge,
            Duration::minutes(TWO_FACTOR_CHALLENGE_MINUTES),
        )
    }

    fn issue(&self, subject: &TokenSubject, token_type: TokenType, lifetime: Duration) -> Result<String> {
        let now = Utc::now();

        let claims = Claims {
            sub: subject.user_id.to_string(),
            email: subject.email.clone(),
            tenant_id: subject.tenant_id.to_string(),
            tenant_type: subject.tenant_type,
            role: subject.role,
            plan: subject.plan,
            exp: (now + lifetime).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type,
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Validate signature and expiry
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(self.algorithm);
        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(token_data.claims)
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims> {
        self.validate_typed(token, TokenType::Access)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims> {
        self.validate_typed(token, TokenType::Refresh)
    }

    pub fn validate_two_factor_challenge(&self, token: &str) -> Result<Claims> {
        self.validate_typed(token, TokenType::TwoFactorChallenge)
    }

    fn validate_typed(&self, token: &str, expected: TokenType) -> Result<Claims> {
        let claims = self.validate_token(token)?;

        if claims.token_type != expected {
            return Err(AuthError::InvalidToken(format!(
                "Expected a {:?} token",
                expected
            )));
        }

        Ok(claims)
    }
}

/// SHA-256 hex digest of a token, which is what sessions store
pub fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt() -> JwtService {
        JwtService::new("test-secret-key-min-32-characters-long", 60, 30)
    }

    fn subject() -> TokenSubject {
        TokenSubject {
            user_id: Uuid::new_v4(),
            email: "jane@acme.io".to_string(),
            tenant_id: Uuid::new_v4(),
            tenant_type: TenantType::Company,
            role: Role::Admin,
            plan: PlanTier::Business,
        }
    }

    #[test]
    fn test_access_token_carries_tenant_claims() {
        let jwt = jwt();
        let subject = subject();

        let token = jwt.generate_access_token(&subject).expect("Failed to generate token");
        let claims = jwt.validate_access_token(&token).expect("Failed to validate token");

        assert_eq!(claims.user_id().unwrap(), subject.user_id);
        assert_eq!(claims.tenant_uuid().unwrap(), subject.tenant_id);
        assert_eq!(claims.tenant_type, TenantType::Company);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.plan, PlanTier::Business);
        assert_eq!(claims.email, "jane@acme.io");
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_refresh_token_lifetime() {
        let jwt = jwt();
        let token = jwt.generate_refresh_token(&subject()).unwrap();
        let claims = jwt.validate_refresh_token(&token).unwrap();

        assert_eq!(claims.token_type, TokenType::Refresh);
        assert_eq!(claims.exp - claims.iat, 30 * 24 * 3600);
    }

    #[test]
    fn test_challenge_token_is_short_lived() {
        let jwt = jwt();
        let token = jwt.generate_two_factor_challenge(&subject()).unwrap();
        let claims = jwt.validate_two_factor_challenge(&token).unwrap();

        assert_eq!(claims.exp - claims.iat, 300);
    }

    #[test]
    fn test_wrong_token_type_is_rejected() {
        let jwt = jwt();
        let subject = subject();

        let refresh = jwt.generate_refresh_token(&subject).unwrap();
        assert!(matches!(
            jwt.validate_access_token(&refresh),
            Err(AuthError::InvalidToken(_))
        ));

        let challenge = jwt.generate_two_factor_challenge(&subject).unwrap();
        assert!(jwt.validate_access_token(&challenge).is_err());
        assert!(jwt.validate_refresh_token(&challenge).is_err());
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let token = jwt().generate_access_token(&subject()).unwrap();
        let other = JwtService::new("another-secret-key-also-32-characters", 60, 30);

        assert!(other.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_hash_token() {
        let hash1 = hash_token("some-jwt-token");
        let hash2 = hash_token("some-jwt-token");

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
        assert_ne!(hash1, hash_token("different-token"));
    }
}
