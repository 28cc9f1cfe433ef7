//! FNV-1a 64-bit digest for replay determinism checks.
//!
//! A replay is deterministic when the digest of the bytes it consumed matches
//! a golden digest recorded earlier. FNV-1a is not collision resistant; it is
//! only a fast fingerprint for "same bytes, same order".

use crate::error::ConfigError;

// =============================================================================
// Constants
// =============================================================================

/// FNV-1a 64-bit offset basis.
pub const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
/// FNV-1a 64-bit prime.
pub const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

// =============================================================================
// Fnv1a64
// =============================================================================

/// Streaming FNV-1a hasher.
///
/// Feeding a buffer in any number of chunks gives the same digest as hashing
/// it in one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fnv1a64 {
    state: u64,
    len: u64,
}

impl Fnv1a64 {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: FNV_OFFSET_BASIS,
            len: 0,
        }
    }

    /// Feed bytes into the hash.
    pub fn update(&mut self, data: &[u8]) {
        let mut h = self.state;
        for &b in data {
            h ^= u64::from(b);
            h = h.wrapping_mul(FNV_PRIME);
        }
        self.state = h;
        self.len += data.len() as u64;
    }

    #[must_use]
    pub const fn digest(&self) -> u64 {
        self.state
    }

    /// Number of bytes hashed so far.
    #[must_use]
    pub const fn bytes_hashed(&self) -> u64 {
        self.len
    }
}

impl Default for Fnv1a64 {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot FNV-1a over a buffer.
#[must_use]
pub fn fnv1a64(data: &[u8]) -> u64 {
    let mut h = Fnv1a64::new();
    h.update(data);
    h.digest()
}

/// 16 lowercase hex digits, zero padded.
#[must_use]
pub fn to_hex(digest: u64) -> String {
    format!("{digest:016x}")
}

/// Parse a digest written as hex, with or without a `0x` prefix.
///
/// Surrounding whitespace is ignored so golden files with a trailing newline
/// parse cleanly.
pub fn parse_hex_digest(s: &str) -> Result<u64, ConfigError> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() || digits.len() > 16 {
        return Err(ConfigError::InvalidDigest(s.to_string()));
    }
    u64::from_str_radix(digits, 16).map_err(|_| ConfigError::InvalidDigest(s.to_string()))
}
