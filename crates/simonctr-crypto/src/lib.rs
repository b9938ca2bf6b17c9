//! # simonctr Crypto
//!
//! Cryptographic primitives for the simonctr session-key handshake.
//!
//! This crate provides:
//! - Simon Feistel block cipher, parameterized over block and key size
//! - Bit-granular counter mode over Simon128/256
//! - Textbook RSA encryption and signatures over `(e, n)` / `(d, n)` keys
//! - SHA3-512 digests read as little-endian integers
//! - Decimal-string serde helpers for big integers
//! - Constant-time comparison and OS randomness
//!
//! ## Cryptographic Suite
//!
//! | Function | Algorithm | Notes |
//! |----------|-----------|-------|
//! | Block cipher | Simon (72 rounds) | 128/256 for sessions |
//! | Stream | CTR, MSB-first blocks | Partial final block |
//! | Key transport | RSA, unpadded | `m^e mod n` |
//! | Signature | RSA over SHA3-512 | `h^d mod n` |
//! | Hash | SHA3-512 | Little-endian integer |
//!
//! ## Example
//!
//! ```
//! use simonctr_crypto::SessionKey;
//! use simonctr_crypto::ctr::CounterStream;
//! use num_bigint::BigUint;
//!
//! let key = SessionKey::generate().unwrap();
//! let stream = CounterStream::new(&key).unwrap();
//!
//! let plaintext = BigUint::from(0x7420_6e69_u32);
//! let (nonce, ciphertext) = stream.encrypt(&plaintext).unwrap();
//! assert_eq!(stream.decrypt(nonce, &ciphertext).unwrap(), plaintext);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod cipher;
pub mod constant_time;
pub mod ctr;
pub mod decimal;
pub mod error;
pub mod hash;
pub mod random;
pub mod rsa;

pub use error::CryptoError;

use num_bigint::BigUint;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Session key size in bits (Simon128/256 key)
pub const SESSION_KEY_BITS: u64 = 256;

/// SHA3-512 output size
pub const SHA3_512_OUTPUT_SIZE: usize = 64;

/// Session key width in bytes
pub const SESSION_KEY_LEN: usize = 32;

/// Symmetric session key agreed during the handshake.
///
/// A non-negative integer below `2^256`, used as the Simon128/256 master
/// key for counter mode. Held as little-endian bytes and zeroized on drop;
/// integer views are built on demand.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_LEN]);

impl SessionKey {
    /// Generate a uniformly random 256-bit session key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::RandomFailed`] if the OS CSPRNG fails.
    pub fn generate() -> Result<Self, CryptoError> {
        Ok(Self(random::random_32()?))
    }

    /// Wrap little-endian key bytes.
    #[must_use]
    pub fn from_le_bytes(bytes: [u8; SESSION_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Wrap an existing integer.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] if the value exceeds 256 bits.
    pub fn from_biguint(value: &BigUint) -> Result<Self, CryptoError> {
        if value.bits() > SESSION_KEY_BITS {
            return Err(CryptoError::InvalidKeyLength {
                expected: SESSION_KEY_BITS,
                actual: value.bits(),
            });
        }
        let mut digits = value.to_bytes_le();
        let mut bytes = [0u8; SESSION_KEY_LEN];
        bytes[..digits.len()].copy_from_slice(&digits);
        digits.zeroize();
        Ok(Self(bytes))
    }

    /// Little-endian key bytes
    #[must_use]
    pub fn as_le_bytes(&self) -> &[u8; SESSION_KEY_LEN] {
        &self.0
    }

    /// Key as an integer.
    ///
    /// The returned value is a copy outside the zeroized storage; keep it
    /// short-lived.
    #[must_use]
    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_le(&self.0)
    }

    /// Key as decimal digits
    #[must_use]
    pub fn to_decimal(&self) -> String {
        decimal::to_string(&self.to_biguint())
    }
}

impl PartialEq for SessionKey {
    fn eq(&self, other: &Self) -> bool {
        constant_time::ct_eq(&self.0, &other.0)
    }
}

impl Eq for SessionKey {}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionKey").field(&"<redacted>").finish()
    }
}

/// Minimal little-endian encoding of an integer; zero encodes as no bytes.
#[must_use]
pub fn minimal_le_bytes(value: &BigUint) -> Vec<u8> {
    if value.bits() == 0 {
        Vec::new()
    } else {
        value.to_bytes_le()
    }
}
