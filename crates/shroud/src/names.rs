//! Opaque identifier generation
//!
//! An opaque name is a single lowercase letter followed by a random value
//! rendered in radix 32 (`0-9a-v`). The leading letter keeps the result a
//! valid bare identifier in Java and Kotlin.
//!
//! There is no cross-call uniqueness check. Uniqueness relies on the size of
//! the random space relative to the number of components in a project.

use crate::error::Result;

const RADIX32_DIGITS: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";

pub const DEFAULT_NAME_BITS: u32 = 32;
pub const MIN_NAME_BITS: u32 = 8;
pub const MAX_NAME_BITS: u32 = 64;

/// Source of opaque simple names
///
/// The scanner only depends on this trait, so callers can substitute a
/// deterministic source.
pub trait IdentifierSource {
    fn next_identifier(&mut self) -> Result<String>;
}

/// Identifier source backed by the operating system's CSPRNG
#[derive(Debug, Clone)]
pub struct RandomIdentifiers {
    bits: u32,
}

impl Default for RandomIdentifiers {
    fn default() -> Self {
        Self::new(DEFAULT_NAME_BITS)
    }
}

impl RandomIdentifiers {
    /// Create a source producing `bits` random bits per identifier body.
    /// The value is clamped to `MIN_NAME_BITS..=MAX_NAME_BITS`.
    pub fn new(bits: u32) -> Self {
        Self {
            bits: bits.clamp(MIN_NAME_BITS, MAX_NAME_BITS),
        }
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    fn random_body(&self) -> Result<u64> {
        let mut bytes = [0u8; 8];
        getrandom::getrandom(&mut bytes)?;
        let value = u64::from_le_bytes(bytes);
        if self.bits == u64::BITS {
            Ok(value)
        } else {
            Ok(value & ((1u64 << self.bits) - 1))
        }
    }

    fn random_letter() -> Result<char> {
        // 234 is the largest multiple of 26 that fits in a byte
        let mut byte = [0u8; 1];
        loop {
            getrandom::getrandom(&mut byte)?;
            if byte[0] < 234 {
                return Ok(char::from(b'a' + byte[0] % 26));
            }
        }
    }
}

impl IdentifierSource for RandomIdentifiers {
    fn next_identifier(&mut self) -> Result<String> {
        let prefix = Self::random_letter()?;
        let body = to_radix32(self.random_body()?);
        let mut identifier = String::with_capacity(body.len() + 1);
        identifier.push(prefix);
        identifier.push_str(&body);
        Ok(identifier)
    }
}

/// Render `value` in radix 32 with lowercase digits and no leading zeros
pub fn to_radix32(mut value: u64) -> String {
    if value == 0 {
        return "0".to_owned();
    }
    let mut digits = Vec::with_capacity(13);
    while value > 0 {
        digits.push(RADIX32_DIGITS[(value % 32) as usize]);
        value /= 32;
    }
    digits.reverse();
    digits.into_iter().map(char::from).collect()
}

/// Check that `name` has the shape of a generated identifier: `[a-z][a-z0-9]+`
pub fn is_opaque_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }
    let rest = chars.as_str();
    !rest.is_empty()
        && rest
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}
