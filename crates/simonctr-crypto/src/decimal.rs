//! Decimal-string encoding of big integers.
//!
//! The wire protocol and key files carry every large integer as a string of
//! ASCII decimal digits. Use with `#[serde(with = "simonctr_crypto::decimal")]`.

use crate::CryptoError;
use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serializer, de};

/// Parse a non-empty string of ASCII decimal digits.
///
/// Signs, whitespace and digit separators are rejected.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidParameter`] for anything else.
pub fn parse(s: &str) -> Result<BigUint, CryptoError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CryptoError::InvalidParameter(
            "expected decimal digits".to_string(),
        ));
    }
    BigUint::parse_bytes(s.as_bytes(), 10)
        .ok_or_else(|| CryptoError::InvalidParameter("expected decimal digits".to_string()))
}

/// Render as decimal digits.
#[must_use]
pub fn to_string(value: &BigUint) -> String {
    value.to_str_radix(10)
}

/// Serde serializer
///
/// # Errors
///
/// Propagates serializer errors.
pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_string(value))
}

/// Serde deserializer
///
/// # Errors
///
/// Fails if the input is not a decimal digit string.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
    let s = String::deserialize(deserializer)?;
    parse(&s).map_err(de::Error::custom)
}
