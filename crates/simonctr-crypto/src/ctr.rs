//! Bit-granular counter mode over Simon128/256.
//!
//! The plaintext is an unsigned integer of `n` significant bits, sliced
//! most-significant first into 128-bit blocks. Block `i` is XORed with
//! `E(nonce + i)`. When `n` is not a multiple of 128 the final block is
//! `n mod 128` bits wide and is XORed with the *leading* bits of its
//! 128-bit keystream block.
//!
//! Ciphertext keeps every block at its fixed width ([`CtrCiphertext`]), so
//! leading zero bits are never lost. Converting to a plain integer for
//! transport must carry [`CtrCiphertext::bit_len`] alongside it.
//!
//! ## Nonces
//!
//! [`CtrNonce::generate`] places a microsecond Unix timestamp in the upper
//! 64 bits. Values are strictly increasing within a process, even when two
//! are drawn in the same microsecond.

use crate::cipher::{BlockCipher, CipherParams};
use crate::{CryptoError, SessionKey};
use num_bigint::BigUint;
use num_traits::Zero;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Keystream block width in bits.
pub const CTR_BLOCK_BITS: u32 = 128;

static LAST_NONCE_MICROS: AtomicU64 = AtomicU64::new(0);

fn width_mask(width: u32) -> u128 {
    if width >= 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

/// Counter-mode nonce ("ToD").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CtrNonce(u128);

impl CtrNonce {
    /// Draw a fresh nonce from the wall clock.
    ///
    /// Upper 64 bits: microseconds since the Unix epoch, bumped past the
    /// previous value if the clock has not advanced. Lower 64 bits: zero.
    #[must_use]
    pub fn generate() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
            .unwrap_or(0);

        let previous = LAST_NONCE_MICROS
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        let micros = now.max(previous.saturating_add(1));

        Self(u128::from(micros) << 64)
    }

    /// Wrap a nonce received from a peer.
    #[must_use]
    pub fn from_u128(value: u128) -> Self {
        Self(value)
    }

    /// Raw nonce value
    #[must_use]
    pub fn as_u128(self) -> u128 {
        self.0
    }

    /// Counter input for keystream block `index`.
    #[must_use]
    pub fn counter_block(self, index: u64) -> u128 {
        self.0.wrapping_add(u128::from(index))
    }
}

/// Counter-mode ciphertext with fixed-width blocks.
///
/// Every block but the last is 128 bits wide; the last is
/// `bit_len mod 128` bits wide when that is non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtrCiphertext {
    bit_len: u64,
    blocks: Vec<u128>,
}

impl CtrCiphertext {
    /// Build from raw blocks, checking the layout against `bit_len`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::BitLengthMismatch`] if the block count differs
    /// from `ceil(bit_len / 128)` or the last block overflows its width.
    pub fn from_blocks(bit_len: u64, blocks: Vec<u128>) -> Result<Self, CryptoError> {
        let expected_blocks = block_count(bit_len);
        if blocks.len() as u64 != expected_blocks {
            return Err(CryptoError::BitLengthMismatch {
                expected: bit_len,
                actual: blocks.len() as u64 * u64::from(CTR_BLOCK_BITS),
            });
        }

        let ct = Self { bit_len, blocks };
        if let Some(&last) = ct.blocks.last() {
            let width = ct.block_width(ct.blocks.len() - 1);
            if last & !width_mask(width) != 0 {
                return Err(CryptoError::BitLengthMismatch {
                    expected: bit_len,
                    actual: bit_len - u64::from(width) + u64::from(128 - last.leading_zeros()),
                });
            }
        }
        Ok(ct)
    }

    /// Split an integer received off the wire into `bit_len` bits of blocks.
    ///
    /// Values narrower than `bit_len` are left-padded with zero bits.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::BitLengthMismatch`] if `value` needs more than
    /// `bit_len` bits, or if `bit_len` exceeds `value` by more than one
    /// block. An honest ciphertext only reaches that width when its leading
    /// 128-bit block is all zeros.
    pub fn from_biguint(value: &BigUint, bit_len: u64) -> Result<Self, CryptoError> {
        let actual = value.bits();
        if actual > bit_len || bit_len - actual > u64::from(CTR_BLOCK_BITS) {
            return Err(CryptoError::BitLengthMismatch {
                expected: bit_len,
                actual,
            });
        }
        Ok(Self {
            bit_len,
            blocks: slice_blocks(value, bit_len),
        })
    }

    /// Concatenate the blocks into one integer.
    ///
    /// Leading zero bits are dropped by the integer form; pair it with
    /// [`bit_len`](Self::bit_len).
    #[must_use]
    pub fn to_biguint(&self) -> BigUint {
        join_blocks(&self.blocks, self.bit_len)
    }

    /// Total width in bits
    #[must_use]
    pub fn bit_len(&self) -> u64 {
        self.bit_len
    }

    /// Fixed-width blocks, first block most significant
    #[must_use]
    pub fn blocks(&self) -> &[u128] {
        &self.blocks
    }

    /// True for a zero-bit ciphertext
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Width in bits of block `index`.
    #[must_use]
    pub fn block_width(&self, index: usize) -> u32 {
        block_width(self.bit_len, index)
    }
}

fn block_count(bit_len: u64) -> u64 {
    bit_len.div_ceil(u64::from(CTR_BLOCK_BITS))
}

fn block_width(bit_len: u64, index: usize) -> u32 {
    let remainder = bit_len % u64::from(CTR_BLOCK_BITS);
    if index as u64 + 1 == block_count(bit_len) && remainder != 0 {
        // remainder < 128
        #[allow(clippy::cast_possible_truncation)]
        let width = remainder as u32;
        width
    } else {
        CTR_BLOCK_BITS
    }
}

/// Low `width` bits of `value >> shift`.
fn take_bits(value: &BigUint, shift: u64, width: u32) -> u128 {
    let shifted = value >> shift;
    let mut out = 0u128;
    for (i, digit) in shifted.iter_u64_digits().take(2).enumerate() {
        out |= u128::from(digit) << (64 * i);
    }
    out & width_mask(width)
}

fn slice_blocks(value: &BigUint, bit_len: u64) -> Vec<u128> {
    let count = block_count(bit_len);
    let mut blocks = Vec::with_capacity(count as usize);
    let mut consumed = 0u64;
    for index in 0..count as usize {
        let width = block_width(bit_len, index);
        consumed += u64::from(width);
        blocks.push(take_bits(value, bit_len - consumed, width));
    }
    blocks
}

fn join_blocks(blocks: &[u128], bit_len: u64) -> BigUint {
    let mut acc = BigUint::zero();
    for (index, &block) in blocks.iter().enumerate() {
        acc <<= block_width(bit_len, index);
        acc |= BigUint::from(block);
    }
    acc
}

/// Keystream generator and XOR stream keyed with a session key.
#[derive(Debug, Clone)]
pub struct CounterStream {
    cipher: BlockCipher,
}

impl CounterStream {
    /// Key a Simon128/256 instance with the session key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] if the key exceeds 256 bits.
    pub fn new(session_key: &SessionKey) -> Result<Self, CryptoError> {
        Ok(Self {
            cipher: BlockCipher::new(CipherParams::SIMON_128_256, &session_key.to_biguint())?,
        })
    }

    /// Encrypt under a freshly generated nonce.
    ///
    /// # Errors
    ///
    /// Propagates block cipher errors.
    pub fn encrypt(&self, plaintext: &BigUint) -> Result<(CtrNonce, CtrCiphertext), CryptoError> {
        let nonce = CtrNonce::generate();
        let ciphertext = self.encrypt_with_nonce(nonce, plaintext)?;
        Ok((nonce, ciphertext))
    }

    /// Encrypt under a caller-chosen nonce.
    ///
    /// The caller must never reuse a nonce with the same key.
    ///
    /// # Errors
    ///
    /// Propagates block cipher errors.
    pub fn encrypt_with_nonce(
        &self,
        nonce: CtrNonce,
        plaintext: &BigUint,
    ) -> Result<CtrCiphertext, CryptoError> {
        let bit_len = plaintext.bits();
        let blocks = self.xor_keystream(nonce, bit_len, &slice_blocks(plaintext, bit_len))?;
        Ok(CtrCiphertext { bit_len, blocks })
    }

    /// Decrypt with the nonce transmitted by the sender.
    ///
    /// # Errors
    ///
    /// Propagates block cipher errors.
    pub fn decrypt(&self, nonce: CtrNonce, ciphertext: &CtrCiphertext) -> Result<BigUint, CryptoError> {
        let blocks = self.xor_keystream(nonce, ciphertext.bit_len, &ciphertext.blocks)?;
        Ok(join_blocks(&blocks, ciphertext.bit_len))
    }

    /// Encrypt bytes read as a little-endian integer.
    ///
    /// Trailing zero bytes are not significant in that encoding and do not
    /// survive the round trip.
    ///
    /// # Errors
    ///
    /// Propagates block cipher errors.
    pub fn encrypt_bytes(&self, data: &[u8]) -> Result<(CtrNonce, CtrCiphertext), CryptoError> {
        self.encrypt(&BigUint::from_bytes_le(data))
    }

    /// Decrypt to the minimal little-endian byte encoding of the plaintext.
    ///
    /// # Errors
    ///
    /// Propagates block cipher errors.
    pub fn decrypt_bytes(
        &self,
        nonce: CtrNonce,
        ciphertext: &CtrCiphertext,
    ) -> Result<Vec<u8>, CryptoError> {
        Ok(crate::minimal_le_bytes(&self.decrypt(nonce, ciphertext)?))
    }

    fn xor_keystream(
        &self,
        nonce: CtrNonce,
        bit_len: u64,
        blocks: &[u128],
    ) -> Result<Vec<u128>, CryptoError> {
        let mut out = Vec::with_capacity(blocks.len());
        for (index, &block) in blocks.iter().enumerate() {
            let keystream = self.cipher.encrypt(nonce.counter_block(index as u64))?;
            let width = block_width(bit_len, index);
            out.push(block ^ (keystream >> (CTR_BLOCK_BITS - width)));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LITERAL: &str = "74206e69345345345345206d6f635453564abc369";
    const FIXED_NONCE: u128 = 0x0005_f1b2_3c4d_5e6f << 64;

    fn hex(s: &str) -> BigUint {
        BigUint::parse_bytes(s.as_bytes(), 16).unwrap()
    }

    fn zero_key_stream() -> CounterStream {
        CounterStream::new(&SessionKey::from_biguint(&BigUint::zero()).unwrap()).unwrap()
    }

    #[test]
    fn test_literal_known_answer() {
        let stream = zero_key_stream();
        let nonce = CtrNonce::from_u128(FIXED_NONCE);
        let ct = stream.encrypt_with_nonce(nonce, &hex(LITERAL)).unwrap();

        assert_eq!(ct.bit_len(), 163);
        assert_eq!(ct.blocks().len(), 2);
        assert_eq!(ct.block_width(1), 35);
        assert_eq!(ct.to_biguint(), hex("511e6fffdf3215d8d7e0d79ded04f055fa6da6bb"));
        assert_eq!(stream.decrypt(nonce, &ct).unwrap(), hex(LITERAL));
    }

    #[test]
    fn test_leading_zero_ciphertext_survives_integer_form() {
        let stream = zero_key_stream();
        let nonce = CtrNonce::from_u128(FIXED_NONCE);
        let ct = stream.encrypt_with_nonce(nonce, &hex(LITERAL)).unwrap();

        // 163 significant plaintext bits, 159 significant ciphertext bits
        let wire = ct.to_biguint();
        assert_eq!(wire.bits(), 159);

        let received = CtrCiphertext::from_biguint(&wire, ct.bit_len()).unwrap();
        assert_eq!(received, ct);
        assert_eq!(stream.decrypt(nonce, &received).unwrap(), hex(LITERAL));
    }

    #[test]
    fn test_single_partial_block() {
        let stream = zero_key_stream();
        let nonce = CtrNonce::from_u128(FIXED_NONCE);
        let ct = stream.encrypt_with_nonce(nonce, &BigUint::from(0x61u8)).unwrap();

        assert_eq!(ct.bit_len(), 7);
        assert_eq!(ct.blocks(), &[0x10]);
        assert_eq!(stream.decrypt(nonce, &ct).unwrap(), BigUint::from(0x61u8));
    }

    #[test]
    fn test_exact_block_multiple() {
        let stream = zero_key_stream();
        let nonce = CtrNonce::from_u128(FIXED_NONCE);
        let pt = (BigUint::from(1u8) << 255u32) | BigUint::from(0xabcdu32);
        let ct = stream.encrypt_with_nonce(nonce, &pt).unwrap();

        assert_eq!(ct.bit_len(), 256);
        assert_eq!(ct.block_width(0), 128);
        assert_eq!(ct.block_width(1), 128);
        assert_eq!(stream.decrypt(nonce, &ct).unwrap(), pt);
    }

    #[test]
    fn test_full_block_uses_whole_keystream() {
        let key = SessionKey::from_biguint(&hex("0123456789")).unwrap();
        let stream = CounterStream::new(&key).unwrap();
        let cipher = BlockCipher::new(CipherParams::SIMON_128_256, &key.to_biguint()).unwrap();
        let nonce = CtrNonce::from_u128(FIXED_NONCE);
        let pt = u128::MAX;

        let ct = stream.encrypt_with_nonce(nonce, &BigUint::from(pt)).unwrap();
        assert_eq!(ct.blocks(), &[pt ^ cipher.encrypt(FIXED_NONCE).unwrap()]);
    }

    #[test]
    fn test_partial_block_uses_leading_keystream_bits() {
        let key = SessionKey::from_biguint(&hex("0123456789")).unwrap();
        let stream = CounterStream::new(&key).unwrap();
        let cipher = BlockCipher::new(CipherParams::SIMON_128_256, &key.to_biguint()).unwrap();
        let nonce = CtrNonce::from_u128(FIXED_NONCE);

        // 129 bits: one full block, then a single bit from counter + 1
        let pt = BigUint::from(1u8) << 128u32;
        let ct = stream.encrypt_with_nonce(nonce, &pt).unwrap();
        let ks0 = cipher.encrypt(FIXED_NONCE).unwrap();
        let ks1 = cipher.encrypt(FIXED_NONCE + 1).unwrap();

        assert_eq!(ct.blocks(), &[(1u128 << 127) ^ ks0, ks1 >> 127]);
    }

    #[test]
    fn test_empty_plaintext() {
        let stream = zero_key_stream();
        let nonce = CtrNonce::from_u128(FIXED_NONCE);
        let ct = stream.encrypt_with_nonce(nonce, &BigUint::zero()).unwrap();

        assert!(ct.is_empty());
        assert_eq!(ct.bit_len(), 0);
        assert!(stream.decrypt(nonce, &ct).unwrap().is_zero());
        assert!(stream.decrypt_bytes(nonce, &ct).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_nonce_does_not_decrypt() {
        let stream = zero_key_stream();
        let ct = stream
            .encrypt_with_nonce(CtrNonce::from_u128(FIXED_NONCE), &hex(LITERAL))
            .unwrap();
        let other = stream
            .decrypt(CtrNonce::from_u128(FIXED_NONCE + (1 << 64)), &ct)
            .unwrap();

        assert_ne!(other, hex(LITERAL));
    }

    #[test]
    fn test_bytes_roundtrip() {
        let key = SessionKey::generate().unwrap();
        let stream = CounterStream::new(&key).unwrap();
        let message = br#"{"agreement_data":{"hash_sess_key":"42"},"signature":"7"}"#;

        let (nonce, ct) = stream.encrypt_bytes(message).unwrap();
        assert_eq!(stream.decrypt_bytes(nonce, &ct).unwrap(), message.to_vec());
    }

    // ========================================================================
    // Width validation
    // ========================================================================

    #[test]
    fn test_oversized_integer_rejected() {
        let value = BigUint::from(0x1ffu32);
        assert!(matches!(
            CtrCiphertext::from_biguint(&value, 8),
            Err(CryptoError::BitLengthMismatch { expected: 8, actual: 9 })
        ));
    }

    #[test]
    fn test_width_beyond_value_rejected() {
        let one = BigUint::from(1u8);
        assert!(CtrCiphertext::from_biguint(&one, 129).is_ok());
        assert!(matches!(
            CtrCiphertext::from_biguint(&one, 130),
            Err(CryptoError::BitLengthMismatch { expected: 130, actual: 1 })
        ));
        assert!(matches!(
            CtrCiphertext::from_biguint(&one, u64::MAX),
            Err(CryptoError::BitLengthMismatch { expected: u64::MAX, actual: 1 })
        ));

        // Zero-bit and short all-zero ciphertexts stay representable
        assert!(CtrCiphertext::from_biguint(&BigUint::zero(), 0).unwrap().is_empty());
        assert!(CtrCiphertext::from_biguint(&BigUint::zero(), 128).is_ok());
    }

    #[test]
    fn test_from_blocks_validates_layout() {
        assert!(CtrCiphertext::from_blocks(130, vec![0, 0b11]).is_ok());
        assert!(CtrCiphertext::from_blocks(130, vec![0]).is_err());
        assert!(CtrCiphertext::from_blocks(130, vec![0, 0b111]).is_err());
        assert!(CtrCiphertext::from_blocks(0, vec![]).is_ok());
        assert!(CtrCiphertext::from_blocks(0, vec![1]).is_err());
    }

    // ========================================================================
    // Nonce generation
    // ========================================================================

    #[test]
    fn test_nonce_layout() {
        let nonce = CtrNonce::generate();
        assert_eq!(nonce.as_u128() as u64, 0);
        assert!(nonce.as_u128() >> 64 > 0);
    }

    #[test]
    fn test_nonce_strictly_increasing() {
        let mut previous = CtrNonce::generate();
        for _ in 0..1000 {
            let next = CtrNonce::generate();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn test_counter_block() {
        let nonce = CtrNonce::from_u128(u128::MAX);
        assert_eq!(nonce.counter_block(0), u128::MAX);
        assert_eq!(nonce.counter_block(1), 0);
    }
}
