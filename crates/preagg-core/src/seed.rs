//! Batch keys and the digits-of-π seed derivation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, PreaggError};

/// Leading significant decimal digits of π, enough for every valid batch key.
const PI_DIGITS: &str = "314159265358979";

/// Seeds are reduced into `[0, 2^23)`.
const SEED_MODULUS: u64 = 1 << 23;

/// Identifier of one reproducibility unit of stochastic samples.
///
/// Valid keys lie in `0..=14`; the seed construction runs out of digits
/// beyond that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BatchKey(u8);

impl BatchKey {
    /// Largest accepted batch key.
    pub const MAX: u32 = 14;

    /// Validates and wraps a raw batch key.
    pub fn new(raw: u32) -> Result<Self, PreaggError> {
        if raw > Self::MAX {
            return Err(out_of_range(raw));
        }
        Ok(Self(raw as u8))
    }

    /// Returns the raw key.
    pub fn get(self) -> u32 {
        u32::from(self.0)
    }

    /// Name of the campaign grouping the resources of this batch.
    pub fn campaign_name(self) -> String {
        format!("c{}", self.0)
    }

    /// Deterministic seed associated with the batch.
    pub fn seed(self) -> u64 {
        seed_for_valid_key(self.0 as usize)
    }
}

impl TryFrom<u32> for BatchKey {
    type Error = PreaggError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        BatchKey::new(value)
    }
}

impl From<BatchKey> for u32 {
    fn from(value: BatchKey) -> Self {
        value.get()
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derives the RNG seed for a batch key.
///
/// With `n = key + 1`, the seed is the integer formed by the first `n`
/// significant digits of `π·10^n`, reduced modulo `2^23`. Keys above 14 are
/// rejected.
pub fn derive_seed(batch_key: u32) -> Result<u64, PreaggError> {
    if batch_key > BatchKey::MAX {
        return Err(out_of_range(batch_key));
    }
    Ok(seed_for_valid_key(batch_key as usize))
}

fn seed_for_valid_key(key: usize) -> u64 {
    let digits = &PI_DIGITS[..key + 1];
    let value = digits
        .bytes()
        .fold(0u64, |acc, digit| acc * 10 + u64::from(digit - b'0'));
    value % SEED_MODULUS
}

fn out_of_range(raw: u32) -> PreaggError {
    PreaggError::Seed(
        ErrorInfo::new(
            "batch-key-out-of-range",
            format!("cannot derive seeds for batch keys greater than {}", BatchKey::MAX),
        )
        .with_context("batch_key", raw.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_keys_follow_pi_digits() {
        assert_eq!(derive_seed(0).unwrap(), 3);
        assert_eq!(derive_seed(1).unwrap(), 31);
        assert_eq!(derive_seed(2).unwrap(), 314);
        assert_eq!(derive_seed(6).unwrap(), 3_141_592 % SEED_MODULUS);
        assert_eq!(derive_seed(14).unwrap(), 314_159_265_358_979 % SEED_MODULUS);
    }

    #[test]
    fn batch_key_rejects_fifteen() {
        assert!(BatchKey::new(15).is_err());
        assert_eq!(BatchKey::new(3).unwrap().campaign_name(), "c3");
    }
}
