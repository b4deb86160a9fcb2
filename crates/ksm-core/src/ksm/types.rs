//! Core types for the secrets-manager client utilities.

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Algorithm
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Hash algorithm used for the TOTP HMAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Algorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl Default for Algorithm {
    fn default() -> Self {
        Self::Sha1
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri_name())
    }
}

impl Algorithm {
    /// Match the `algorithm` query value, ignoring case.
    ///
    /// Only the exact names `SHA1`, `SHA256` and `SHA512` are accepted;
    /// spellings such as `SHA-1` are rejected.
    pub fn from_uri_name(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SHA1" => Some(Self::Sha1),
            "SHA256" => Some(Self::Sha256),
            "SHA512" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Name used in `otpauth://` parameters.
    pub fn uri_name(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  TOTP parameters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const DEFAULT_DIGITS: u64 = 6;
pub const DEFAULT_PERIOD: u64 = 30;

/// Validated parameters of an `otpauth://` URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotpParams {
    /// Base-32 secret exactly as it appeared in the URI.
    pub secret: String,
    pub algorithm: Algorithm,
    /// Always 6, 7 or 8 once validated.
    pub digits: u8,
    /// Time step in seconds, never zero.
    pub period: u64,
    /// Explicit moving factor; 0 means "use the wall clock".
    pub counter: u64,
}

impl TotpParams {
    /// Parameters with the URI defaults and the given secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            algorithm: Algorithm::default(),
            digits: DEFAULT_DIGITS as u8,
            period: DEFAULT_PERIOD,
            counter: 0,
        }
    }

    pub fn with_algorithm(mut self, algo: Algorithm) -> Self {
        self.algorithm = algo;
        self
    }

    pub fn with_digits(mut self, digits: u8) -> Self {
        self.digits = digits;
        self
    }

    pub fn with_period(mut self, period: u64) -> Self {
        self.period = period;
        self
    }

    pub fn with_counter(mut self, counter: u64) -> Self {
        self.counter = counter;
        self
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Generated code result
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A generated TOTP code with its validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotpCode {
    /// Zero-padded numeric code, `digits` characters long.
    pub code: String,
    /// Seconds left in the current period (1..=period).
    pub time_left: u64,
    /// Period the code was generated with, in seconds.
    pub period: u64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Configuration keys
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Keys of the client configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigKey {
    ClientId,
    ClientKey,
    AppKey,
    PrivateKey,
    Server,
}

impl ConfigKey {
    /// JSON property name in the config file.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientId => "clientId",
            Self::ClientKey => "clientKey",
            Self::AppKey => "appKey",
            Self::PrivateKey => "privateKey",
            Self::Server => "server",
        }
    }

    pub fn all() -> [ConfigKey; 5] {
        [
            Self::ClientId,
            Self::ClientKey,
            Self::AppKey,
            Self::PrivateKey,
            Self::Server,
        ]
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contents of a configuration store.
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Error type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Error kind for this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KsmErrorKind {
    /// URI scheme is not `otpauth` (or the input is not a URI).
    InvalidScheme,
    /// `secret` parameter absent or empty.
    MissingSecret,
    /// `algorithm` is not SHA1, SHA256 or SHA512.
    UnsupportedAlgorithm,
    /// `digits` is not 6, 7 or 8.
    InvalidDigits,
    /// Secret is not decodable base-32.
    InvalidSecret,
    InvalidInput,
    ParseError,
    StorageError,
    IoError,
    PermissionDenied,
}

/// Crate-level error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KsmError {
    pub kind: KsmErrorKind,
    pub message: String,
    pub detail: Option<String>,
}

impl fmt::Display for KsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)?;
        if let Some(d) = &self.detail {
            write!(f, " ({})", d)?;
        }
        Ok(())
    }
}

impl std::error::Error for KsmError {}

impl KsmError {
    pub fn new(kind: KsmErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl From<std::io::Error> for KsmError {
    fn from(e: std::io::Error) -> Self {
        let kind = if e.kind() == std::io::ErrorKind::PermissionDenied {
            KsmErrorKind::PermissionDenied
        } else {
            KsmErrorKind::IoError
        };
        KsmError::new(kind, e.to_string())
    }
}

impl From<serde_json::Error> for KsmError {
    fn from(e: serde_json::Error) -> Self {
        KsmError::new(KsmErrorKind::ParseError, format!("JSON: {}", e))
    }
}

impl From<KsmError> for String {
    fn from(e: KsmError) -> String {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Algorithm ────────────────────────────────────────────────

    #[test]
    fn algorithm_default_is_sha1() {
        assert_eq!(Algorithm::default(), Algorithm::Sha1);
    }

    #[test]
    fn algorithm_from_uri_name_ignores_case() {
        assert_eq!(Algorithm::from_uri_name("sha1"), Some(Algorithm::Sha1));
        assert_eq!(Algorithm::from_uri_name("Sha256"), Some(Algorithm::Sha256));
        assert_eq!(Algorithm::from_uri_name("SHA512"), Some(Algorithm::Sha512));
    }

    #[test]
    fn algorithm_from_uri_name_is_strict() {
        assert_eq!(Algorithm::from_uri_name("SHA-256"), None);
        assert_eq!(Algorithm::from_uri_name("HMAC-SHA1"), None);
        assert_eq!(Algorithm::from_uri_name("md5"), None);
        assert_eq!(Algorithm::from_uri_name(""), None);
    }

    #[test]
    fn algorithm_serde() {
        let json = serde_json::to_string(&Algorithm::Sha256).unwrap();
        assert_eq!(json, "\"SHA256\"");
    }

    // ── TotpParams ───────────────────────────────────────────────

    #[test]
    fn params_defaults() {
        let p = TotpParams::new("JBSWY3DPEHPK3PXP");
        assert_eq!(p.algorithm, Algorithm::Sha1);
        assert_eq!(p.digits, 6);
        assert_eq!(p.period, 30);
        assert_eq!(p.counter, 0);
    }

    // ── ConfigKey ────────────────────────────────────────────────

    #[test]
    fn config_key_names_match_serde() {
        for key in ConfigKey::all() {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
        }
    }

    // ── Error ────────────────────────────────────────────────────

    #[test]
    fn error_display() {
        let err = KsmError::new(KsmErrorKind::InvalidSecret, "bad base32").with_detail("len 9");
        let s = err.to_string();
        assert!(s.contains("InvalidSecret"));
        assert!(s.contains("bad base32"));
        assert!(s.contains("len 9"));
    }

    #[test]
    fn io_permission_error_maps_to_permission_denied() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(KsmError::from(io).kind, KsmErrorKind::PermissionDenied);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(KsmError::from(io).kind, KsmErrorKind::IoError);
    }
}
