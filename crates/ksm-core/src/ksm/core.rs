//! Core OTP generation: RFC 4226 truncation over the RFC 6238 time step.
//!
//! HMAC with SHA-1, SHA-256 or SHA-512, secret decoding with the
//! `otpauth://` padding rule, and time-step helpers.

use crate::ksm::types::*;
use crate::ksm::uri::parse_otpauth_uri;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Raw HMAC-OTP (RFC 4226 §5.3)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compute an OTP code for raw key bytes and a moving factor.
pub fn hotp_raw(key: &[u8], counter: u64, digits: u8, algo: Algorithm) -> String {
    let digest = compute_hmac(key, &counter.to_be_bytes(), algo);
    truncate(&digest, digits)
}

macro_rules! hmac_digest {
    ($hash:ty, $key:expr, $data:expr) => {{
        let mut mac = Hmac::<$hash>::new_from_slice($key).expect("HMAC accepts any key length");
        mac.update($data);
        mac.finalize().into_bytes().to_vec()
    }};
}

/// Compute HMAC(key, message) using the specified algorithm.
fn compute_hmac(key: &[u8], data: &[u8], algo: Algorithm) -> Vec<u8> {
    match algo {
        Algorithm::Sha1 => hmac_digest!(Sha1, key, data),
        Algorithm::Sha256 => hmac_digest!(Sha256, key, data),
        Algorithm::Sha512 => hmac_digest!(Sha512, key, data),
    }
}

/// Dynamic truncation per RFC 4226 §5.3.
fn truncate(digest: &[u8], digits: u8) -> String {
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let bin_code = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    format_code(bin_code, digits)
}

/// `bin_code mod 10^digits`, left-padded with zeros to `digits` characters.
fn format_code(bin_code: u32, digits: u8) -> String {
    let modulus = 10u64.pow(digits as u32);
    let code = bin_code as u64 % modulus;
    format!("{:0>width$}", code, width = digits as usize)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Time steps
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Time-step counter for a moving factor.
pub fn time_step_at(moving_factor: u64, period: u64) -> u64 {
    moving_factor / period
}

/// Seconds remaining in the period containing `moving_factor`.
pub fn seconds_remaining_at(moving_factor: u64, period: u64) -> u64 {
    period - (moving_factor % period)
}

/// Current unix timestamp in seconds.
pub fn current_unix_time() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  TOTP (RFC 6238)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Generate the current code for an `otpauth://` URI.
pub fn get_totp_code(uri: &str) -> Result<TotpCode, KsmError> {
    get_totp_code_at(uri, current_unix_time())
}

/// Generate the code for an `otpauth://` URI as of `unix_seconds`.
///
/// An explicit `counter` in the URI takes precedence over the timestamp.
pub fn get_totp_code_at(uri: &str, unix_seconds: u64) -> Result<TotpCode, KsmError> {
    let params = parse_otpauth_uri(uri).map_err(|e| {
        log::debug!("Rejected otpauth URI: {:?}", e.kind);
        e
    })?;
    params.generate_at(unix_seconds)
}

impl TotpParams {
    /// Moving factor: the explicit counter if set, else the timestamp.
    pub fn moving_factor(&self, unix_seconds: u64) -> u64 {
        if self.counter > 0 {
            self.counter
        } else {
            unix_seconds
        }
    }

    /// Generate the code as of `unix_seconds`.
    pub fn generate_at(&self, unix_seconds: u64) -> Result<TotpCode, KsmError> {
        if self.period == 0 {
            return Err(KsmError::new(KsmErrorKind::InvalidInput, "TOTP period must be positive"));
        }
        if !(6..=8).contains(&self.digits) {
            return Err(KsmError::new(
                KsmErrorKind::InvalidDigits,
                "TOTP Digits may only be 6, 7, or 8",
            ));
        }

        let moving_factor = self.moving_factor(unix_seconds);
        let step = time_step_at(moving_factor, self.period);
        let key = decode_secret(&self.secret)?;

        Ok(TotpCode {
            code: hotp_raw(&key, step, self.digits, self.algorithm),
            time_left: seconds_remaining_at(moving_factor, self.period),
            period: self.period,
        })
    }

    /// Generate the code for the current wall-clock time.
    pub fn generate(&self) -> Result<TotpCode, KsmError> {
        self.generate_at(current_unix_time())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Secret decoding
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Decode a base-32 secret, case-insensitively.
///
/// Secrets whose length leaves a remainder of 2, 4, 5 or 7 modulo 8 are
/// padded with `=`; remainders 1, 3 and 6 have no valid padding and fail.
/// Whitespace and separators are not stripped.
pub fn decode_secret(secret: &str) -> Result<Vec<u8>, KsmError> {
    let padded = pad_base32(&secret.to_ascii_uppercase());
    let invalid = || {
        KsmError::new(KsmErrorKind::InvalidSecret, "Invalid base-32 TOTP secret")
            .with_detail(format!("length {}", secret.len()))
    };

    if padded.is_empty() || padded.len() % 8 != 0 {
        return Err(invalid());
    }
    let data = padded.trim_end_matches('=');
    let pad_count = padded.len() - data.len();
    if !matches!(pad_count, 0 | 1 | 3 | 4 | 6) || data.contains('=') {
        return Err(invalid());
    }

    base32::decode(base32::Alphabet::Rfc4648 { padding: false }, data).ok_or_else(invalid)
}

/// Pad to the next multiple of 8 when the remainder admits valid padding.
fn pad_base32(s: &str) -> String {
    let remainder = s.len() % 8;
    if matches!(remainder, 2 | 4 | 5 | 7) {
        format!("{}{}", s, "=".repeat(8 - remainder))
    } else {
        s.to_string()
    }
}
