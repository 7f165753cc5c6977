use crate::error::{AuthError, Result};
use base32::Alphabet;
use image::Luma;
use qrcode::QrCode;
use rand::Rng;
use totp_lite::{totp_custom, Sha1};

const TOTP_DIGITS: u32 = 6;
const TOTP_STEP: u64 = 30; // seconds
const SECRET_BYTES: usize = 20; // 160 bits
const DRIFT_STEPS: i64 = 1;

const SECRET_ALPHABET: Alphabet = Alphabet::Rfc4648 { padding: false };

/// Generate a random base32 secret
pub fn generate_secret() -> String {
    let mut rng = rand::thread_rng();
    let secret_bytes: Vec<u8> = (0..SECRET_BYTES).map(|_| rng.gen()).collect();
    base32::encode(SECRET_ALPHABET, &secret_bytes)
}

fn decode_secret(secret: &str) -> Result<Vec<u8>> {
    base32::decode(SECRET_ALPHABET, secret)
        .ok_or_else(|| AuthError::Validation("Invalid secret format".to_string()))
}

fn unix_now() -> Result<u64> {
    Ok(std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| AuthError::Internal(format!("Time error: {}", e)))?
        .as_secs())
}

/// Time step a unix timestamp falls into
pub fn step_at(unix_time: u64) -> i64 {
    (unix_time / TOTP_STEP) as i64
}

fn code_for_step(secret_bytes: &[u8], step: i64) -> String {
    // totp-lite returns the zero-padded code
    totp_custom::<Sha1>(TOTP_STEP, TOTP_DIGITS, secret_bytes, step as u64 * TOTP_STEP)
}

/// Code for the given unix time
pub fn generate_totp_at(secret: &str, unix_time: u64) -> Result<String> {
    let secret_bytes = decode_secret(secret)?;
    Ok(code_for_step(&secret_bytes, step_at(unix_time)))
}

pub fn generate_totp(secret: &str) -> Result<String> {
    generate_totp_at(secret, unix_now()?)
}

/// Verify a code within ±1 step of `unix_time`. Returns the matching step
/// so callers can reject replays of an already accepted step.
pub fn verify_totp_at(secret: &str, code: &str, unix_time: u64) -> Result<Option<i64>> {
    let code = code.trim();
    if code.len() != TOTP_DIGITS as usize || !code.chars().all(|c| c.is_ascii_digit()) {
        return Ok(None);
    }

    let secret_bytes = decode_secret(secret)?;
    let current = step_at(unix_time);

    for offset in -DRIFT_STEPS..=DRIFT_STEPS {
        let step = current + offset;
        if step < 0 {
            continue;
        }
        if constant_time_compare(&code_for_step(&secret_bytes, step), code) {
            return Ok(Some(step));
        }
    }

    Ok(None)
}

pub fn verify_totp(secret: &str, code: &str) -> Result<Option<i64>> {
    verify_totp_at(secret, code, unix_now()?)
}

/// otpauth:// URI understood by authenticator apps
pub fn generate_totp_uri(secret: &str, account_name: &str, issuer: &str) -> String {
    format!(
        "otpauth://totp/{}:{}?secret={}&issuer={}&algorithm=SHA1&digits={}&period={}",
        urlencoding::encode(issuer),
        urlencoding::encode(account_name),
        secret,
        urlencoding::encode(issuer),
        TOTP_DIGITS,
        TOTP_STEP
    )
}

/// Render a URI as a PNG QR code
pub fn generate_qr_code(totp_uri: &str) -> Result<Vec<u8>> {
    let qr = QrCode::new(totp_uri.as_bytes())
        .map_err(|e| AuthError::Internal(format!("QR code generation failed: {}", e)))?;

    let image = qr.render::<Luma<u8>>().min_dimensions(256, 256).build();

    let mut png_bytes = Vec::new();
    image::DynamicImage::ImageLuma8(image)
        .write_to(&mut std::io::Cursor::new(&mut png_bytes), image::ImageFormat::Png)
        .map_err(|e| AuthError::Internal(format!("PNG encoding failed: {}", e)))?;

    Ok(png_bytes)
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
