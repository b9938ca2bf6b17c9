//! Textbook RSA primitives over `(e, n)` / `(d, n)` key material.
//!
//! The handshake uses raw modular exponentiation with no padding:
//! - session-key transport: `c = m^e mod n`, `m = c^d mod n`
//! - signatures over SHA3-512 digests: `s = h^d mod n`, valid iff
//!   `s^e mod n == h`
//!
//! Key generation is not provided. Key material is loaded from TOML files
//! holding decimal strings:
//!
//! ```toml
//! e = "65537"
//! d = "2566768820219877937619771399350365540677438701530936537766882639..."
//! n = "2716046309368695251437587118741017299416764352663808636080216154..."
//! ```
//!
//! ## Security Properties
//!
//! Unpadded RSA is malleable and deterministic. It is used here exactly as
//! the protocol defines it and is not offered as a general-purpose scheme.

use crate::CryptoError;
use crate::constant_time::ct_eq_biguint;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

fn check_modulus(n: &BigUint) -> Result<(), CryptoError> {
    if n <= &BigUint::one() {
        return Err(CryptoError::InvalidKeyMaterial("modulus must exceed 1".into()));
    }
    Ok(())
}

fn check_exponent(x: &BigUint, name: &str) -> Result<(), CryptoError> {
    if x.is_zero() {
        return Err(CryptoError::InvalidKeyMaterial(format!("{name} must be non-zero")));
    }
    Ok(())
}

/// Public key `(e, n)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PublicKeyFile", into = "PublicKeyFile")]
pub struct PublicKey {
    e: BigUint,
    n: BigUint,
}

#[derive(Clone, Serialize, Deserialize)]
struct PublicKeyFile {
    #[serde(with = "crate::decimal")]
    e: BigUint,
    #[serde(with = "crate::decimal")]
    n: BigUint,
}

impl TryFrom<PublicKeyFile> for PublicKey {
    type Error = CryptoError;

    fn try_from(file: PublicKeyFile) -> Result<Self, Self::Error> {
        Self::new(file.e, file.n)
    }
}

impl From<PublicKey> for PublicKeyFile {
    fn from(key: PublicKey) -> Self {
        Self { e: key.e, n: key.n }
    }
}

impl PublicKey {
    /// Create from exponent and modulus.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyMaterial`] if `n <= 1` or `e == 0`.
    pub fn new(e: BigUint, n: BigUint) -> Result<Self, CryptoError> {
        check_modulus(&n)?;
        check_exponent(&e, "public exponent")?;
        Ok(Self { e, n })
    }

    /// Public exponent
    #[must_use]
    pub fn e(&self) -> &BigUint {
        &self.e
    }

    /// Modulus
    #[must_use]
    pub fn n(&self) -> &BigUint {
        &self.n
    }

    /// Modulus width in bytes.
    #[must_use]
    pub fn modulus_len(&self) -> usize {
        self.n.bits().div_ceil(8) as usize
    }

    /// Encrypt `message` as `message^e mod n`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MessageTooLarge`] if `message >= n`.
    pub fn encrypt(&self, message: &BigUint) -> Result<BigUint, CryptoError> {
        if message >= &self.n {
            return Err(CryptoError::MessageTooLarge);
        }
        Ok(message.modpow(&self.e, &self.n))
    }

    /// Verify that `signature^e mod n` equals `digest`.
    ///
    /// The final comparison runs in constant time at the modulus width.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidSignature`] if the signature is out of
    /// range or does not match.
    pub fn verify(&self, digest: &BigUint, signature: &BigUint) -> Result<(), CryptoError> {
        if signature >= &self.n {
            return Err(CryptoError::InvalidSignature);
        }
        let check = signature.modpow(&self.e, &self.n);
        if ct_eq_biguint(&check, digest, self.modulus_len()) {
            Ok(())
        } else {
            Err(CryptoError::InvalidSignature)
        }
    }
}

/// Private key `(d, n)`.
///
/// The exponent is held as little-endian bytes, zeroized on drop, and
/// rebuilt as an integer only for the duration of one exponentiation.
#[derive(Clone)]
pub struct PrivateKey {
    d: Zeroizing<Vec<u8>>,
    n: BigUint,
}

impl PrivateKey {
    /// Create from private exponent and modulus.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyMaterial`] if `n <= 1` or `d == 0`.
    pub fn new(d: BigUint, n: BigUint) -> Result<Self, CryptoError> {
        check_modulus(&n)?;
        check_exponent(&d, "private exponent")?;
        Ok(Self {
            d: Zeroizing::new(d.to_bytes_le()),
            n,
        })
    }

    /// Modulus
    #[must_use]
    pub fn n(&self) -> &BigUint {
        &self.n
    }

    /// Decrypt `ciphertext` as `ciphertext^d mod n`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Domain`] if `ciphertext >= n`.
    pub fn decrypt(&self, ciphertext: &BigUint) -> Result<BigUint, CryptoError> {
        if ciphertext >= &self.n {
            return Err(CryptoError::Domain("ciphertext exceeds modulus"));
        }
        Ok(ciphertext.modpow(&self.exponent(), &self.n))
    }

    /// Sign a digest integer as `digest^d mod n`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MessageTooLarge`] if `digest >= n`.
    pub fn sign(&self, digest: &BigUint) -> Result<BigUint, CryptoError> {
        if digest >= &self.n {
            return Err(CryptoError::MessageTooLarge);
        }
        Ok(digest.modpow(&self.exponent(), &self.n))
    }

    fn exponent(&self) -> BigUint {
        BigUint::from_bytes_le(&self.d)
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("bits", &self.n.bits())
            .finish_non_exhaustive()
    }
}

/// Matching public and private key.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "KeyPairFile", into = "KeyPairFile")]
pub struct KeyPair {
    public: PublicKey,
    private: PrivateKey,
}

#[derive(Serialize, Deserialize)]
struct KeyPairFile {
    #[serde(with = "crate::decimal")]
    e: BigUint,
    #[serde(with = "crate::decimal")]
    d: BigUint,
    #[serde(with = "crate::decimal")]
    n: BigUint,
}

impl TryFrom<KeyPairFile> for KeyPair {
    type Error = CryptoError;

    fn try_from(file: KeyPairFile) -> Result<Self, Self::Error> {
        Self::from_components(file.e, file.d, file.n)
    }
}

impl From<KeyPair> for KeyPairFile {
    fn from(pair: KeyPair) -> Self {
        Self {
            e: pair.public.e.clone(),
            d: pair.private.exponent(),
            n: pair.public.n.clone(),
        }
    }
}

impl KeyPair {
    /// Assemble a keypair and check that `d` inverts `e`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyMaterial`] if either half is invalid
    /// or the exponents do not invert each other modulo `n`.
    pub fn from_components(e: BigUint, d: BigUint, n: BigUint) -> Result<Self, CryptoError> {
        let public = PublicKey::new(e, n.clone())?;
        let private = PrivateKey::new(d, n)?;

        let witness = BigUint::from(2u8) % public.n();
        let roundtrip = witness
            .modpow(public.e(), public.n())
            .modpow(&private.exponent(), private.n());
        if roundtrip != witness {
            return Err(CryptoError::InvalidKeyMaterial(
                "private exponent does not invert public exponent".into(),
            ));
        }

        Ok(Self { public, private })
    }

    /// Public half
    #[must_use]
    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    /// Private half
    #[must_use]
    pub fn private(&self) -> &PrivateKey {
        &self.private
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tiny textbook key: p = 61, q = 53
    fn toy_pair() -> KeyPair {
        KeyPair::from_components(
            BigUint::from(17u32),
            BigUint::from(2753u32),
            BigUint::from(3233u32),
        )
        .unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let pair = toy_pair();
        let m = BigUint::from(65u32);
        let c = pair.public().encrypt(&m).unwrap();

        assert_eq!(c, BigUint::from(2790u32));
        assert_eq!(pair.private().decrypt(&c).unwrap(), m);
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let pair = toy_pair();
        let digest = BigUint::from(1234u32);
        let sig = pair.private().sign(&digest).unwrap();

        assert!(pair.public().verify(&digest, &sig).is_ok());
        assert!(matches!(
            pair.public().verify(&BigUint::from(1235u32), &sig),
            Err(CryptoError::InvalidSignature)
        ));
    }

    #[test]
    fn test_range_checks() {
        let pair = toy_pair();
        let n = BigUint::from(3233u32);

        assert!(matches!(pair.public().encrypt(&n), Err(CryptoError::MessageTooLarge)));
        assert!(matches!(pair.private().decrypt(&n), Err(CryptoError::Domain(_))));
        assert!(matches!(pair.private().sign(&n), Err(CryptoError::MessageTooLarge)));
        assert!(matches!(
            pair.public().verify(&BigUint::from(1u8), &n),
            Err(CryptoError::InvalidSignature)
        ));
    }

    #[test]
    fn test_mismatched_exponents_rejected() {
        let result = KeyPair::from_components(
            BigUint::from(17u32),
            BigUint::from(2751u32),
            BigUint::from(3233u32),
        );
        assert!(matches!(result, Err(CryptoError::InvalidKeyMaterial(_))));
    }

    #[test]
    fn test_degenerate_components_rejected() {
        assert!(PublicKey::new(BigUint::from(3u8), BigUint::from(1u8)).is_err());
        assert!(PublicKey::new(BigUint::zero(), BigUint::from(3233u32)).is_err());
        assert!(PrivateKey::new(BigUint::zero(), BigUint::from(3233u32)).is_err());
    }

    #[test]
    fn test_keypair_toml_roundtrip() {
        let text = "e = \"17\"\nd = \"2753\"\nn = \"3233\"\n";
        let pair: KeyPair = toml::from_str(text).unwrap();
        assert_eq!(pair.public().n(), &BigUint::from(3233u32));

        let rendered = toml::to_string(&pair).unwrap();
        assert!(rendered.contains("d = \"2753\""));
    }

    #[test]
    fn test_public_key_toml_rejects_numbers() {
        let text = "e = 17\nn = \"3233\"\n";
        assert!(toml::from_str::<PublicKey>(text).is_err());
    }

    #[test]
    fn test_private_exponent_survives_byte_storage() {
        let pair = toy_pair();
        assert_eq!(pair.private().exponent(), BigUint::from(2753u32));
        assert_eq!(pair.private().clone().exponent(), BigUint::from(2753u32));
    }

    #[test]
    fn test_private_key_debug_hides_exponent() {
        let pair = toy_pair();
        let rendered = format!("{:?}", pair.private());
        assert!(!rendered.contains("2753"));
    }
}
