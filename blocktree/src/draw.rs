//! Draw valuation.

use primitive_types::U512;

/// Stake-weighted draw value. A 256-bit digest times a 64-bit stake always
/// fits.
pub type DrawValue = U512;

/// Participation threshold `2^exponent`.
pub fn hardness(exponent: u32) -> DrawValue {
    U512::one() << exponent.min(511)
}

/// `stake * digest`, reading the digest as a big-endian integer.
pub fn weighted_value(digest: &[u8; 32], stake: u64) -> DrawValue {
    U512::from(stake) * U512::from_big_endian(digest)
}
