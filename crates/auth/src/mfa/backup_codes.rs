use crate::error::{AuthError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::Rng;

pub const CODE_COUNT: usize = 10;
const CODE_LENGTH: usize = 8;

// Uppercase alphanumerics without 0/O and 1/I/L, which read alike
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Generate a set of backup codes formatted as `XXXX-XXXX`. The plaintext
/// is shown to the user once.
pub fn generate_backup_codes() -> Vec<String> {
    let mut rng = rand::thread_rng();
    (0..CODE_COUNT)
        .map(|_| {
            let code: String = (0..CODE_LENGTH)
                .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
                .collect();
            format!("{}-{}", &code[..4], &code[4..])
        })
        .collect()
}

/// Canonical form: hyphens and whitespace removed, uppercased
pub fn normalize_backup_code(code: &str) -> String {
    code.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Whether input looks like a backup code rather than a TOTP code
pub fn looks_like_backup_code(code: &str) -> bool {
    let normalized = normalize_backup_code(code);
    normalized.len() == CODE_LENGTH && normalized.chars().all(|c| c.is_ascii_alphanumeric())
}

pub fn hash_backup_code(code: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(normalize_backup_code(code).as_bytes(), &salt)?
        .to_string();

    Ok(hash)
}

pub fn verify_backup_code(code: &str, hash: &str) -> Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AuthError::PasswordHash(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(normalize_backup_code(code).as_bytes(), &parsed_hash)
        .is_ok())
}
