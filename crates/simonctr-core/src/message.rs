//! Typed handshake messages.
//!
//! Large integers travel as decimal strings. The nonce (`ToD`) is a plain
//! JSON number.
//!
//! Hashes and signatures are computed over [`canonical`] bytes: compact
//! `serde_json` output with fields in declaration order. Both peers use the
//! same types, so they agree on the bytes.

use crate::error::FrameError;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use simonctr_crypto::decimal;
use simonctr_crypto::hash::sha3_512_int;

/// Session key and the counter-mode nonce it was used with.
///
/// RSA-encrypted to the responder as the request's `sess_key`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionKeyData {
    /// Session key
    #[serde(with = "decimal")]
    pub key: BigUint,
    /// Counter-mode nonce
    #[serde(rename = "ToD")]
    pub tod: u128,
}

/// Fields covered by the initiator's signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementData {
    /// SHA3-512 of the canonical [`SessionKeyData`], as a little-endian integer
    #[serde(with = "decimal")]
    pub hash_sess_key: BigUint,
    /// Free-form initiator name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}

/// Counter-mode plaintext of the request's `payload`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayload {
    /// Signed fields
    pub agreement_data: AgreementData,
    /// RSA signature over the SHA3-512 of the canonical agreement data
    #[serde(with = "decimal")]
    pub signature: BigUint,
}

/// Handshake request (frame type `'1'`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// RSA ciphertext of the canonical [`SessionKeyData`]
    #[serde(with = "decimal")]
    pub sess_key: BigUint,
    /// Counter-mode ciphertext of the canonical [`SignedPayload`]
    #[serde(with = "decimal")]
    pub payload: BigUint,
    /// Width of `payload` in bits, leading zeros included
    pub payload_bits: u64,
}

/// Plaintext of the response key, RSA-encrypted to the initiator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseKeyData {
    /// Fresh session key chosen by the responder
    #[serde(with = "decimal")]
    pub key: BigUint,
}

/// Key block of a [`Response`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseKey {
    /// RSA ciphertext of the canonical [`ResponseKeyData`]
    #[serde(with = "decimal")]
    pub key: BigUint,
    /// SHA3-512 of the canonical [`ResponseKeyData`], as a little-endian integer
    #[serde(with = "decimal")]
    pub hash_sess_key: BigUint,
}

/// Handshake response (frame type `'2'`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Responder's session key
    pub sess_key: ResponseKey,
}

/// File-transfer header (frame type `'3'`).
///
/// Only the framing and JSON structure are checked; contents are opaque.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileHeader(pub serde_json::Map<String, serde_json::Value>);

/// Canonical bytes of a message.
///
/// # Errors
///
/// Returns [`FrameError::InvalidPayload`] if serialization fails.
pub fn canonical<T: Serialize>(message: &T) -> Result<Vec<u8>, FrameError> {
    serde_json::to_vec(message).map_err(|e| FrameError::InvalidPayload(e.to_string()))
}

/// SHA3-512 of the canonical bytes, as a little-endian integer.
///
/// # Errors
///
/// Returns [`FrameError::InvalidPayload`] if serialization fails.
pub fn canonical_hash<T: Serialize>(message: &T) -> Result<BigUint, FrameError> {
    Ok(sha3_512_int(&canonical(message)?))
}

/// Read bytes as a little-endian integer.
#[must_use]
pub fn bytes_to_int(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_le(bytes)
}

/// Decode a recovered integer as UTF-8 JSON of type `T`.
///
/// The integer is reinterpreted as its minimal little-endian byte string.
///
/// # Errors
///
/// Returns a description of the first failure (UTF-8 or JSON).
pub fn int_to_json<T: serde::de::DeserializeOwned>(value: &BigUint) -> Result<T, String> {
    let bytes = simonctr_crypto::minimal_le_bytes(value);
    let text = std::str::from_utf8(&bytes).map_err(|e| e.to_string())?;
    serde_json::from_str(text).map_err(|e| e.to_string())
}
