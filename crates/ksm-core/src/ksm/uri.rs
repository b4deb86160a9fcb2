//! `otpauth://` URI parsing.
//!
//! Format: `otpauth://totp/LABEL?secret=BASE32&algorithm=SHA1&digits=6&period=30`
//!
//! Only the query string matters for code generation; the OTP type and label
//! are accepted but not interpreted.
//!
//! Compatibility quirk: `digits`, `period` and `counter` are parsed
//! leniently. A value that is not a positive decimal integer (empty, signed,
//! zero, fractional, non-numeric) silently keeps the default instead of
//! raising an error. Callers must not rely on these three fields being
//! strictly validated.

use crate::ksm::types::*;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Parse
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse and validate an `otpauth://` URI.
///
/// Checks run in a fixed order: scheme, secret, algorithm, digits. The
/// secret itself is only base-32 decoded at generation time.
pub fn parse_otpauth_uri(uri: &str) -> Result<TotpParams, KsmError> {
    let url = url::Url::parse(uri).map_err(|e| {
        KsmError::new(KsmErrorKind::InvalidScheme, "Not an otpauth URI").with_detail(e.to_string())
    })?;

    if url.scheme() != "otpauth" {
        return Err(KsmError::new(
            KsmErrorKind::InvalidScheme,
            format!("Not an otpauth URI (scheme '{}')", url.scheme()),
        ));
    }

    let mut secret: Option<String> = None;
    let mut algorithm = String::from("SHA1");
    let mut digits = DEFAULT_DIGITS;
    let mut period = DEFAULT_PERIOD;
    let mut counter = 0u64;

    for (key, value) in url.query_pairs() {
        // blank values are dropped, as if the key were absent
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            "secret" => secret = Some(value.into_owned()),
            "algorithm" => algorithm = value.into_owned(),
            "digits" => digits = positive_int(&value).unwrap_or(digits),
            "period" => period = positive_int(&value).unwrap_or(period),
            "counter" => counter = positive_int(&value).unwrap_or(counter),
            _ => {}
        }
    }

    let secret = match secret {
        Some(s) if !s.is_empty() => s,
        _ => {
            return Err(KsmError::new(
                KsmErrorKind::MissingSecret,
                "TOTP secret not found in URI",
            ))
        }
    };

    let algorithm = Algorithm::from_uri_name(&algorithm).ok_or_else(|| {
        KsmError::new(
            KsmErrorKind::UnsupportedAlgorithm,
            format!(
                "Invalid value \"{}\" for TOTP algorithm, must be SHA1, SHA256 or SHA512",
                algorithm.to_uppercase()
            ),
        )
    })?;

    if !(6..=8).contains(&digits) {
        return Err(KsmError::new(
            KsmErrorKind::InvalidDigits,
            "TOTP Digits may only be 6, 7, or 8",
        )
        .with_detail(format!("got {}", digits)));
    }

    Ok(TotpParams {
        secret,
        algorithm,
        digits: digits as u8,
        period,
        counter,
    })
}

impl TotpParams {
    /// Parse and validate an `otpauth://` URI.
    pub fn from_uri(uri: &str) -> Result<Self, KsmError> {
        parse_otpauth_uri(uri)
    }
}

/// A run of ASCII digits with a value above zero. Runs too long for `u64`
/// saturate rather than fall back, since they are still positive integers.
fn positive_int(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n = value.parse::<u64>().unwrap_or(u64::MAX);
    (n > 0).then_some(n)
}
