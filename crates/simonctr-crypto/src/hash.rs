//! SHA3-512 hashing.
//!
//! The handshake reads digests as little-endian integers, both for the
//! textbook signature check and for the decimal `hash_sess_key` field.

use num_bigint::BigUint;
use sha3::{Digest, Sha3_512};

/// SHA3-512 output (64 bytes).
pub type Digest512 = [u8; 64];

/// Compute the SHA3-512 digest of `data`.
#[must_use]
pub fn sha3_512(data: &[u8]) -> Digest512 {
    let mut hasher = Sha3_512::new();
    hasher.update(data);
    let mut out = [0u8; 64];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Interpret a digest as a little-endian unsigned integer.
#[must_use]
pub fn digest_to_int(digest: &Digest512) -> BigUint {
    BigUint::from_bytes_le(digest)
}

/// SHA3-512 of `data`, as a little-endian integer.
#[must_use]
pub fn sha3_512_int(data: &[u8]) -> BigUint {
    digest_to_int(&sha3_512(data))
}
