pub mod backup_codes;
pub mod totp;

pub use backup_codes::{
    generate_backup_codes, hash_backup_code, looks_like_backup_code, verify_backup_code,
};
pub use totp::{generate_qr_code, generate_secret, generate_totp_uri, verify_totp};
