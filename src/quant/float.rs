//! 16-bit float decoding

/// 2^-24, the value of the smallest f16 subnormal
const F16_SUBNORMAL_STEP: f32 = 1.0 / 16_777_216.0;

/// Convert IEEE 754 half-precision bits to f32
///
/// Handles signed zeros, subnormals (no implicit bit, exponent −14),
/// normals (bias 15) and the max exponent (±infinity or NaN).
pub fn f16_to_f32(bits: u16) -> f32 {
    let sign = ((bits >> 15) & 0x1) as u32;
    let exp = ((bits >> 10) & 0x1F) as u32;
    let mant = (bits & 0x03FF) as u32;

    match exp {
        0 => {
            // Zero or subnormal: mant × 2^-24, exact in f32
            let magnitude = mant as f32 * F16_SUBNORMAL_STEP;
            if sign == 1 {
                -magnitude
            } else {
                magnitude
            }
        }
        0x1F => {
            if mant == 0 {
                f32::from_bits((sign << 31) | 0x7F80_0000)
            } else {
                f32::from_bits((sign << 31) | 0x7FC0_0000 | (mant << 13))
            }
        }
        _ => {
            // Rebias 15 -> 127 and widen the mantissa
            f32::from_bits((sign << 31) | ((exp + 112) << 23) | (mant << 13))
        }
    }
}

/// Convert bfloat16 bits to f32 (the upper half of an f32)
pub fn bf16_to_f32(bits: u16) -> f32 {
    f32::from_bits((bits as u32) << 16)
}

/// Little-endian f16 at the start of `bytes`
pub(crate) fn read_f16_le(bytes: &[u8]) -> f32 {
    f16_to_f32(u16::from_le_bytes([bytes[0], bytes[1]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_bit_patterns() {
        assert_eq!(f16_to_f32(0x3C00), 1.0);
        assert_eq!(f16_to_f32(0xC000), -2.0);
        assert_eq!(f16_to_f32(0x7C00), f32::INFINITY);
        assert_eq!(f16_to_f32(0xFC00), f32::NEG_INFINITY);
        assert_eq!(f16_to_f32(0x0000), 0.0);
        assert!(f16_to_f32(0x8000).is_sign_negative());
        assert!(f16_to_f32(0x7E00).is_nan());
        assert_eq!(f16_to_f32(0x7BFF), 65504.0);
        assert_eq!(f16_to_f32(0x3555), 0.333251953125);
    }

    #[test]
    fn test_subnormals() {
        assert_eq!(f16_to_f32(0x0001), 2.0f32.powi(-24));
        assert_eq!(f16_to_f32(0x03FF), 1023.0 * 2.0f32.powi(-24));
        assert_eq!(f16_to_f32(0x8001), -(2.0f32.powi(-24)));
    }

    #[test]
    fn test_matches_half_crate_for_every_pattern() {
        for bits in 0..=u16::MAX {
            let ours = f16_to_f32(bits);
            let reference = half::f16::from_bits(bits).to_f32();
            if reference.is_nan() {
                assert!(ours.is_nan(), "0x{:04X} should be NaN", bits);
            } else {
                assert_eq!(ours.to_bits(), reference.to_bits(), "0x{:04X}", bits);
            }
        }
    }

    #[test]
    fn test_bf16() {
        assert_eq!(bf16_to_f32(0x3F80), 1.0);
        assert_eq!(bf16_to_f32(0xC000), -2.0);
        assert_eq!(bf16_to_f32(0x7F80), f32::INFINITY);
        assert_eq!(bf16_to_f32(0x0000), 0.0);
        assert_eq!(bf16_to_f32(half::bf16::from_f32(0.15625).to_bits()), 0.15625);
    }
}
