//! Content hashes used as package identifiers.

use preagg_core::errors::PreaggError;
use preagg_core::serde::to_canonical_json_bytes;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Computes a stable hexadecimal hash for the provided serializable payload.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, PreaggError> {
    let bytes = to_canonical_json_bytes(value)?;
    let digest = Sha256::digest(bytes);
    Ok(format!("{:x}", digest))
}
