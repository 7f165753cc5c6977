use crate::error::{AuthError, Result};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;

const NONCE_LEN: usize = 12;

/// AES-256-GCM encryption for secrets stored in the database.
///
/// Format: base64(nonce || ciphertext || tag)
#[derive(Clone)]
pub struct SecretCipher {
    cipher: Aes256Gcm,
}

impl SecretCipher {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Build from a base64-encoded 32-byte key
    pub fn from_base64_key(key_b64: &str) -> Result<Self> {
        let key_bytes = STANDARD
            .decode(key_b64.trim())
            .map_err(|e| AuthError::Configuration(format!("Invalid encryption key format: {}", e)))?;

        let key: [u8; 32] = key_bytes.as_slice().try_into().map_err(|_| {
            AuthError::Configuration(format!(
                "Encryption key must be 32 bytes (256 bits), got {} bytes",
                key_bytes.len()
            ))
        })?;

        Ok(Self::new(&key))
    }

    pub fn from_env() -> Result<Self> {
        let key = std::env::var("TWO_FACTOR_ENCRYPTION_KEY").map_err(|_| {
            AuthError::Configuration("TWO_FACTOR_ENCRYPTION_KEY must be set".to_string())
        })?;
        Self::from_base64_key(&key)
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| AuthError::Encryption(format!("Encryption failed: {}", e)))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(&combined))
    }

    pub fn decrypt(&self, encrypted: &str) -> Result<String> {
        let combined = STANDARD
            .decode(encrypted)
            .map_err(|e| AuthError::Encryption(format!("Invalid encrypted data format: {}", e)))?;

        if combined.len() < NONCE_LEN {
            return Err(AuthError::Encryption("Encrypted data too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| AuthError::Encryption(format!("Decryption failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| AuthError::Encryption(format!("Invalid secret encoding: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> SecretCipher {
        SecretCipher::new(&[7u8; 32])
    }

    #[test]
    fn test_encrypt_then_decrypt() {
        let cipher = cipher();
        let encrypted = cipher.encrypt("JBSWY3DPEHPK3PXP").unwrap();

        assert_ne!(encrypted, "JBSWY3DPEHPK3PXP");
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), "JBSWY3DPEHPK3PXP");
    }

    #[test]
    fn test_nonce_is_random() {
        let cipher = cipher();
        assert_ne!(cipher.encrypt("secret").unwrap(), cipher.encrypt("secret").unwrap());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let cipher = cipher();
        let encrypted = cipher.encrypt("secret").unwrap();

        let mut bytes = STANDARD.decode(&encrypted).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        assert!(cipher.decrypt(&STANDARD.encode(&bytes)).is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = cipher().encrypt("secret").unwrap();
        let other = SecretCipher::new(&[8u8; 32]);

        assert!(other.decrypt(&encrypted).is_err());
    }

    #[test]
    fn test_key_length_is_checked() {
        let short = STANDARD.encode([1u8; 16]);
        assert!(matches!(
            SecretCipher::from_base64_key(&short),
            Err(AuthError::Configuration(_))
        ));

        let valid = STANDARD.encode([1u8; 32]);
        assert!(SecretCipher::from_base64_key(&valid).is_ok());
    }
}
