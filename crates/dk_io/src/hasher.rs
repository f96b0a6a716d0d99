//! SHA-256 version stamps for room documents.
//!
//! A stamp is the lowercase hex digest of the document's canonical JSON
//! bytes, so two writers holding equal documents agree on the stamp.

use digest::Digest;
use serde::Serialize;
use sha2::Sha256;

use crate::canonical_json::to_canonical_bytes;
use crate::IoResult;

/// Lowercase hex digest of `bytes` under any `Digest`.
pub fn hex_digest<D: Digest>(bytes: &[u8]) -> String {
    hex::encode(D::digest(bytes))
}

#[inline]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex_digest::<Sha256>(bytes)
}

/// Stamp of a serializable value via its canonical bytes.
pub fn version_stamp<T: Serialize>(value: &T) -> IoResult<String> {
    Ok(sha256_hex(&to_canonical_bytes(value)?))
}
