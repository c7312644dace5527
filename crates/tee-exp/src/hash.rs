use serde::Serialize;
use sha2::{Digest, Sha256};
use tee_core::errors::TeeError;

use crate::serde::to_canonical_json_bytes;

/// SHA-256 over the canonical JSON encoding of `value`, as lowercase hex.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, TeeError> {
    let mut hasher = Sha256::new();
    hasher.update(to_canonical_json_bytes(value)?);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Leading twelve hex digits for log lines.
pub(crate) fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
