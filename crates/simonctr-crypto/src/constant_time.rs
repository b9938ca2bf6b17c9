//! Constant-time cryptographic operations.
//!
//! Provides timing-safe comparisons for signature checks and digest
//! confirmation. Execution time depends only on the compared widths, not
//! on content.

use num_bigint::BigUint;
use subtle::ConstantTimeEq;

/// Constant-time comparison of byte slices.
///
/// Returns `true` if slices are equal, `false` otherwise.
/// Execution time depends only on slice length, not content.
#[must_use]
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.ct_eq(b).into()
}

/// Constant-time comparison of two integers at a fixed byte width.
///
/// Both values are zero-padded to `width` little-endian bytes before the
/// comparison. A value wider than `width` compares unequal; only the
/// public width leaks through timing.
#[must_use]
#[inline(never)]
pub fn ct_eq_biguint(a: &BigUint, b: &BigUint, width: usize) -> bool {
    match (fixed_width_le(a, width), fixed_width_le(b, width)) {
        (Some(a), Some(b)) => ct_eq(&a, &b),
        _ => false,
    }
}

fn fixed_width_le(value: &BigUint, width: usize) -> Option<Vec<u8>> {
    let mut bytes = value.to_bytes_le();
    if bytes.len() > width {
        return None;
    }
    bytes.resize(width, 0);
    Some(bytes)
}
