//! Encoding helpers shared by the SDK: UTF-8, base64, big-endian integers,
//! JSON documents and a couple of environment probes.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use rand::RngCore;

use crate::ksm::types::*;

/// URL-safe alphabet that accepts input with or without `=` padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Bytes / strings / integers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn bytes_to_string(b: &[u8]) -> Result<String, KsmError> {
    String::from_utf8(b.to_vec())
        .map_err(|e| KsmError::new(KsmErrorKind::ParseError, format!("Invalid UTF-8: {}", e)))
}

pub fn string_to_bytes(s: &str) -> Vec<u8> {
    s.as_bytes().to_vec()
}

/// Interpret up to 16 bytes as a big-endian unsigned integer.
pub fn bytes_to_int(b: &[u8]) -> Result<u128, KsmError> {
    if b.len() > 16 {
        return Err(KsmError::new(
            KsmErrorKind::InvalidInput,
            format!("{} bytes do not fit a 128-bit integer", b.len()),
        ));
    }
    Ok(b.iter().fold(0u128, |acc, &byte| (acc << 8) | byte as u128))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Base64
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Standard alphabet, padded.
pub fn bytes_to_base64(b: &[u8]) -> String {
    STANDARD.encode(b)
}

/// Decode URL-safe base64 (padding optional).
pub fn base64_to_bytes(s: &str) -> Result<Vec<u8>, KsmError> {
    URL_SAFE_LENIENT
        .decode(s.trim_end_matches('='))
        .map_err(|e| KsmError::new(KsmErrorKind::ParseError, format!("Invalid base64: {}", e)))
}

/// Decode standard base64 into a UTF-8 string.
pub fn base64_to_string(s: &str) -> Result<String, KsmError> {
    let bytes = STANDARD
        .decode(s)
        .map_err(|e| KsmError::new(KsmErrorKind::ParseError, format!("Invalid base64: {}", e)))?;
    bytes_to_string(&bytes)
}

/// Decode a URL-safe base64 string whose padding may have been dropped.
pub fn url_safe_str_to_bytes(s: &str) -> Result<Vec<u8>, KsmError> {
    base64_to_bytes(s)
}

pub fn url_safe_str_to_int(s: &str) -> Result<u128, KsmError> {
    bytes_to_int(&url_safe_str_to_bytes(s)?)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Randomness / time / platform
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `length` bytes from the operating system CSPRNG.
pub fn generate_random_bytes(length: usize) -> Vec<u8> {
    let mut buf = vec![0u8; length];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    buf
}

pub fn now_milliseconds() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Platform name as reported to the server: `linux`, `macOS`, or the raw
/// target OS otherwise.
pub fn get_os() -> String {
    match std::env::consts::OS {
        "linux" => "linux".to_string(),
        "macos" => "macOS".to_string(),
        other => other.to_string(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  JSON
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Serialise with 4-space indentation.
pub fn dict_to_json(map: &ConfigMap) -> Result<String, KsmError> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    serde::Serialize::serialize(map, &mut ser)?;
    bytes_to_string(&out)
}

/// Parse a JSON object, or `None` (with a warning) if the text is not one.
pub fn json_to_dict(json: &str) -> Option<ConfigMap> {
    match serde_json::from_str::<serde_json::Value>(json) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        Ok(other) => {
            log::warn!("Expected a JSON object, got {}", json_kind(&other));
            None
        }
        Err(e) => {
            log::warn!("{}", e);
            None
        }
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
