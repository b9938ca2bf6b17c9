//! Cryptographic error types.

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Value outside the integer range a primitive accepts
    #[error("value out of domain: {0}")]
    Domain(&'static str),

    /// Ciphertext does not fit the bit length it was declared with
    #[error("bit length mismatch: expected {expected} bits, got {actual}")]
    BitLengthMismatch {
        /// Declared bit length
        expected: u64,
        /// Bit length actually present
        actual: u64,
    },

    /// Invalid key length
    #[error("invalid key length: expected at most {expected} bits, got {actual}")]
    InvalidKeyLength {
        /// Maximum key length in bits
        expected: u64,
        /// Actual key length in bits
        actual: u64,
    },

    /// Invalid parameter
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Message does not fit below the RSA modulus
    #[error("message too large for modulus")]
    MessageTooLarge,

    /// Invalid signature
    #[error("invalid signature")]
    InvalidSignature,

    /// Invalid key material (corrupted or wrong format)
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Random number generation failed
    #[error("random number generation failed")]
    RandomFailed,
}
