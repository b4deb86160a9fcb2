//! Password generation.
//!
//! Randomness comes from an explicit [`SecureRandomSource`]; there is no
//! fallback to a weaker generator.

use rand::{CryptoRng, Rng, RngCore};
use serde::{Deserialize, Serialize};

pub const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
pub const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const DIGITS: &str = "0123456789";
pub const SPECIAL_CHARACTERS: &str = "\"!@#$%()+;<>=?[]{}^.,";

pub const DEFAULT_PASSWORD_LENGTH: usize = 64;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Random source
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Cryptographically strong randomness.
///
/// Implemented for every `RngCore + CryptoRng`, so `rand::rngs::OsRng` is
/// the production source and a seeded `StdRng` works in tests.
pub trait SecureRandomSource {
    /// Uniform index in `0..upper`. `upper` must be non-zero.
    fn random_index(&mut self, upper: usize) -> usize;

    fn fill_random(&mut self, buf: &mut [u8]);
}

impl<R: RngCore + CryptoRng> SecureRandomSource for R {
    fn random_index(&mut self, upper: usize) -> usize {
        self.gen_range(0..upper)
    }

    fn fill_random(&mut self, buf: &mut [u8]) {
        self.fill_bytes(buf);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Sampling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `length` characters drawn uniformly, with replacement, from `alphabet`.
pub fn random_sample<R: SecureRandomSource + ?Sized>(
    rng: &mut R,
    length: usize,
    alphabet: &str,
) -> String {
    let chars: Vec<char> = alphabet.chars().collect();
    if chars.is_empty() {
        return String::new();
    }
    (0..length)
        .map(|_| chars[rng.random_index(chars.len())])
        .collect()
}

/// In-place Fisher–Yates shuffle.
fn shuffle<T, R: SecureRandomSource + ?Sized>(rng: &mut R, items: &mut [T]) {
    for i in (1..items.len()).rev() {
        let j = rng.random_index(i + 1);
        items.swap(i, j);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Password policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How many characters of each class to generate.
///
/// When every class count is zero, `length` is split evenly across the four
/// classes and special characters take the remainder. Otherwise the counts
/// are used as given and `length` is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    pub length: usize,
    pub lowercase: usize,
    pub uppercase: usize,
    pub digits: usize,
    pub special_characters: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            length: DEFAULT_PASSWORD_LENGTH,
            lowercase: 0,
            uppercase: 0,
            digits: 0,
            special_characters: 0,
        }
    }
}

impl PasswordPolicy {
    pub fn with_length(length: usize) -> Self {
        Self {
            length,
            ..Default::default()
        }
    }

    /// Per-class counts after applying the length defaults.
    pub fn resolved_counts(&self) -> (usize, usize, usize, usize) {
        if self.lowercase == 0
            && self.uppercase == 0
            && self.digits == 0
            && self.special_characters == 0
        {
            let length = if self.length == 0 {
                DEFAULT_PASSWORD_LENGTH
            } else {
                self.length
            };
            let quarter = length / 4;
            (quarter, quarter, quarter, quarter + length % 4)
        } else {
            (
                self.lowercase,
                self.uppercase,
                self.digits,
                self.special_characters,
            )
        }
    }
}

/// Generate a password using the operating system CSPRNG.
pub fn generate_password(policy: &PasswordPolicy) -> String {
    generate_password_with(policy, &mut rand::rngs::OsRng)
}

/// Generate a password with an explicit random source.
pub fn generate_password_with<R: SecureRandomSource + ?Sized>(
    policy: &PasswordPolicy,
    rng: &mut R,
) -> String {
    let (lower, upper, digits, special) = policy.resolved_counts();

    let mut chars: Vec<char> = Vec::with_capacity(lower + upper + digits + special);
    for (count, alphabet) in [
        (lower, LOWERCASE),
        (upper, UPPERCASE),
        (digits, DIGITS),
        (special, SPECIAL_CHARACTERS),
    ] {
        chars.extend(random_sample(rng, count, alphabet).chars());
    }

    shuffle(rng, &mut chars);
    chars.into_iter().collect()
}
