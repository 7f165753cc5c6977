use crate::cipher::SecretCipher;
use crate::email::{templates, EmailMessage, MailDispatcher};
use crate::error::{AuthError, Result};
use crate::mfa::{backup_codes, totp};
use crate::password::PasswordHasher;
use base64::{engine::general_purpose::STANDARD, Engine};
use hirehub_database::{BackupCodeRepository, Database, SubscriptionRepository, UserRepository};
use hirehub_models::{BackupCodesResponse, SecondFactor, TwoFactorSetup, TwoFactorStatus, User};
use serde::Serialize;

/// Outcome of a successful second-factor check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SecondFactorVerified {
    pub factor: SecondFactor,
    pub backup_codes_remaining: i64,
}

/// Check a TOTP code and reject steps at or before the last accepted one.
/// Returns the accepted step.
pub fn accept_totp(secret: &str, code: &str, last_step: Option<i64>, unix_time: u64) -> Result<Option<i64>> {
    match totp::verify_totp_at(secret, code, unix_time)? {
        Some(step) if last_step.map_or(true, |last| step > last) => Ok(Some(step)),
        Some(step) => {
            tracing::warn!(step, "Rejected replayed TOTP code");
            Ok(None)
        }
        None => Ok(None),
    }
}

fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

#[derive(Clone)]
pub struct TwoFactorService {
    users: UserRepository,
    backup_codes: BackupCodeRepository,
    subscriptions: SubscriptionRepository,
    cipher: SecretCipher,
    issuer: String,
    mail: MailDispatcher,
}

impl TwoFactorService {
    pub fn new(db: &Database, cipher: SecretCipher, issuer: String, mail: MailDispatcher) -> Self {
        let pool = db.pool().clone();
        Self {
            users: UserRepository::new(pool.clone()),
            backup_codes: BackupCodeRepository::new(pool.clone()),
            subscriptions: SubscriptionRepository::new(pool),
            cipher,
            issuer,
            mail,
        }
    }

    pub async fn status(&self, user: &User) -> Result<TwoFactorStatus> {
        let backup_codes_remaining = if user.two_factor_enabled {
            self.backup_codes.count_unused(user.id).await?
        } else {
            0
        };

        Ok(TwoFactorStatus {
            enabled: user.two_factor_enabled,
            setup_pending: user.two_factor_pending_secret.is_some(),
            backup_codes_remaining,
        })
    }

    /// Generate a pending secret. Starting again replaces any earlier
    /// unconfirmed secret.
    pub async fn begin_setup(&self, user: &User) -> Result<TwoFactorSetup> {
        if user.two_factor_enabled {
            return Err(AuthError::TwoFactorAlreadyEnabled);
        }

        let secret = totp::generate_secret();
        let otpauth_uri = totp::generate_totp_uri(&secret, &user.email, &self.issuer);
        let qr_code_png = STANDARD.encode(totp::generate_qr_code(&otpauth_uri)?);

        self.users
            .set_pending_two_factor_secret(user.id, &self.cipher.encrypt(&secret)?)
            .await?;

        tracing::info!(user_id = %user.id, "Two-factor setup started");

        Ok(TwoFactorSetup {
            secret,
            otpauth_uri,
            qr_code_png,
        })
    }

    /// Confirm the pending secret with a code from the authenticator app,
    /// enable two-factor and issue the first set of backup codes.
    pub async fn confirm_setup(&self, user: &User, code: &str) -> Result<BackupCodesResponse> {
        if user.two_factor_enabled {
            return Err(AuthError::TwoFactorAlreadyEnabled);
        }

        let pending = user
            .two_factor_pending_secret
            .as_deref()
            .ok_or(AuthError::TwoFactorSetupMissing)?;
        let secret = self.cipher.decrypt(pending)?;

        let step = accept_totp(&secret, code, None, unix_now())?
            .ok_or(AuthError::InvalidTwoFactorCode)?;

        self.users.enable_two_factor(user.id, step).await?;
        let codes = self.issue_backup_codes(user).await?;

        tracing::info!(user_id = %user.id, tenant_id = %user.tenant_id, "Two-factor authentication enabled");
        self.notify(user, "Two-factor authentication enabled", templates::two_factor_enabled(&user.full_name()))
            .await;

        Ok(codes)
    }

    /// Verify a TOTP or backup code during login. Backup codes are consumed.
    pub async fn verify_login(&self, user: &User, code: &str) -> Result<SecondFactorVerified> {
        let factor = self.verify_any(user, code).await?;
        let backup_codes_remaining = self.backup_codes.count_unused(user.id).await?;

        if factor == SecondFactor::BackupCode {
            tracing::info!(user_id = %user.id, backup_codes_remaining, "Backup code used");
        }

        Ok(SecondFactorVerified {
            factor,
            backup_codes_remaining,
        })
    }

    /// Turn two-factor off. Requires the password and a current code.
    pub async fn disable(&self, user: &User, password: &str, code: &str) -> Result<()> {
        if !user.two_factor_enabled {
            return Err(AuthError::TwoFactorNotEnabled);
        }

        if !PasswordHasher::verify(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        self.verify_any(user, code).await?;

        self.users.disable_two_factor(user.id).await?;
        self.backup_codes.delete_all(user.id).await?;

        tracing::info!(user_id = %user.id, tenant_id = %user.tenant_id, "Two-factor authentication disabled");
        self.notify(user, "Two-factor authentication disabled", templates::two_factor_disabled(&user.full_name()))
            .await;

        Ok(())
    }

    /// Replace all backup codes. Only an authenticator code is accepted here.
    pub async fn regenerate_backup_codes(&self, user: &User, code: &str) -> Result<BackupCodesResponse> {
        if !user.two_factor_enabled {
            return Err(AuthError::TwoFactorNotEnabled);
        }

        self.verify_totp(user, code).await?;
        let codes = self.issue_backup_codes(user).await?;

        tracing::info!(user_id = %user.id, "Backup codes regenerated");
        Ok(codes)
    }

    async fn verify_any(&self, user: &User, code: &str) -> Result<SecondFactor> {
        if !user.two_factor_enabled {
            return Err(AuthError::TwoFactorNotEnabled);
        }

        if backup_codes::looks_like_backup_code(code) {
            self.consume_backup_code(user, code).await?;
            return Ok(SecondFactor::BackupCode);
        }

        self.verify_totp(user, code).await?;
        Ok(SecondFactor::Totp)
    }

    async fn verify_totp(&self, user: &User, code: &str) -> Result<()> {
        let encrypted = user
            .two_factor_secret
            .as_deref()
            .ok_or(AuthError::TwoFactorNotEnabled)?;
        let secret = self.cipher.decrypt(encrypted)?;

        let step = accept_totp(&secret, code, user.two_factor_last_step, unix_now())?
            .ok_or(AuthError::InvalidTwoFactorCode)?;

        // A concurrent request may have accepted the same step in between
        if !self.users.advance_two_factor_step(user.id, step).await? {
            return Err(AuthError::InvalidTwoFactorCode);
        }

        Ok(())
    }

    async fn consume_backup_code(&self, user: &User, code: &str) -> Result<()> {
        for stored in self.backup_codes.list_unused(user.id).await? {
            if backup_codes::verify_backup_code(code, &stored.code_hash)? {
                if self.backup_codes.mark_used(stored.id).await? {
                    return Ok(());
                }
                break;
            }
        }

        Err(AuthError::InvalidTwoFactorCode)
    }

    async fn issue_backup_codes(&self, user: &User) -> Result<BackupCodesResponse> {
        let codes = backup_codes::generate_backup_codes();
        let hashes = codes
            .iter()
            .map(|c| backup_codes::hash_backup_code(c))
            .collect::<Result<Vec<_>>>()?;

        self.backup_codes.replace_all(user.id, &hashes).await?;

        Ok(BackupCodesResponse { backup_codes: codes })
    }

    async fn notify(&self, user: &User, subject: &str, body: (String, String)) {
        let plan = match self.subscriptions.find_by_tenant(user.tenant_id).await {
            Ok(subscription) => subscription.effective_plan(),
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Skipping notification without subscription");
                return;
            }
        };

        let email = EmailMessage::from_template(&user.email, Some(user.full_name()), subject, body);
        self.mail.notify(user.tenant_id, plan, email).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";
    const NOW: u64 = 1_700_000_000;

    #[test]
    fn test_accept_totp_without_history() {
        let code = totp::generate_totp_at(SECRET, NOW).unwrap();
        assert_eq!(
            accept_totp(SECRET, &code, None, NOW).unwrap(),
            Some(totp::step_at(NOW))
        );
    }

    #[test]
    fn test_accept_totp_rejects_replayed_step() {
        let code = totp::generate_totp_at(SECRET, NOW).unwrap();
        let step = totp::step_at(NOW);

        assert_eq!(accept_totp(SECRET, &code, Some(step), NOW).unwrap(), None);
        assert_eq!(accept_totp(SECRET, &code, Some(step + 1), NOW).unwrap(), None);
        assert_eq!(accept_totp(SECRET, &code, Some(step - 1), NOW).unwrap(), Some(step));
    }

    #[test]
    fn test_accept_totp_rejects_wrong_code() {
        let code = totp::generate_totp_at(SECRET, NOW).unwrap();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        // "000000" could only match if it were a code within the window
        let window: Vec<String> = [NOW - 30, NOW, NOW + 30]
            .iter()
            .map(|t| totp::generate_totp_at(SECRET, *t).unwrap())
            .collect();
        if !window.iter().any(|c| c == wrong) {
            assert_eq!(accept_totp(SECRET, wrong, None, NOW).unwrap(), None);
        }
    }
}
