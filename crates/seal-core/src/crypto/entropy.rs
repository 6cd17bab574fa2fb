//! Gate deciding whether a string is strong enough to serve as key material.

use std::collections::HashMap;

use thiserror::Error;

/// Minimum length for secrets whose keys derive from the process master
/// secret (128-bit security target).
pub const SHARED_KEY_MIN_LENGTH: usize = 22;

/// Minimum length for secrets that derive their own independent key
/// material (256-bit security target).
pub const INDEPENDENT_KEY_MIN_LENGTH: usize = 32;

/// Minimum Shannon entropy, in bits per character.
pub const MIN_BITS_PER_CHAR: f64 = 3.5;

/// Minimum ratio of distinct characters to total length.
pub const MIN_DISTINCT_RATIO: f64 = 0.25;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntropyError {
    /// The caller asked for a weaker minimum than the floor allows.
    #[error("minimum length {requested} is below the floor of {SHARED_KEY_MIN_LENGTH}")]
    InvalidMinimumLength { requested: usize },
}

/// Shannon entropy of `s` over its character distribution, in bits per
/// character. Zero for the empty string.
pub fn shannon_entropy(s: &str) -> f64 {
    let mut counts: HashMap<char, usize> = HashMap::new();
    let mut total = 0usize;
    for c in s.chars() {
        *counts.entry(c).or_default() += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    counts
        .values()
        .map(|&n| {
            let p = n as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Decide whether `secret` is safe to use as cryptographic material.
///
/// Rejects secrets shorter than `minimum_length` characters, secrets whose
/// Shannon entropy is below [`MIN_BITS_PER_CHAR`], and secrets whose
/// distinct-character ratio is below [`MIN_DISTINCT_RATIO`].
///
/// # Errors
///
/// Returns [`EntropyError::InvalidMinimumLength`] if `minimum_length` is below
/// [`SHARED_KEY_MIN_LENGTH`]. A weak secret is `Ok(false)`, never an error.
pub fn has_minimum_entropy(secret: &str, minimum_length: usize) -> Result<bool, EntropyError> {
    if minimum_length < SHARED_KEY_MIN_LENGTH {
        return Err(EntropyError::InvalidMinimumLength {
            requested: minimum_length,
        });
    }
    let len = secret.chars().count();
    if len < minimum_length {
        return Ok(false);
    }
    if shannon_entropy(secret) < MIN_BITS_PER_CHAR {
        return Ok(false);
    }
    let distinct = secret.chars().collect::<std::collections::HashSet<_>>().len();
    Ok(distinct as f64 / len as f64 >= MIN_DISTINCT_RATIO)
}
