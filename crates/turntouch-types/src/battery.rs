//! Battery-level decoding for the standard battery characteristic.

use crate::error::{ParseError, ParseResult};

/// Decode a battery characteristic payload into a 0-100 percentage.
///
/// The remote reports a raw 0-255 reading. The payload is interpreted as a
/// big-endian unsigned integer and scaled with truncating integer division
/// (`raw * 100 / 255`). Payloads longer than one byte would scale past 100,
/// so the result is clamped to keep the percentage invariant.
///
/// Fails with [`ParseError::InvalidPayload`] on an empty payload.
pub fn decode_battery_level(payload: &[u8]) -> ParseResult<u8> {
    if payload.is_empty() {
        return Err(ParseError::invalid_payload("battery payload is empty"));
    }

    let raw = payload
        .iter()
        .take(8)
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));

    Ok((u128::from(raw) * 100 / 255).min(100) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_battery() {
        assert_eq!(decode_battery_level(&[0xFF]).unwrap(), 100);
    }

    #[test]
    fn test_empty_battery() {
        assert_eq!(decode_battery_level(&[0x00]).unwrap(), 0);
    }

    #[test]
    fn test_half_battery_truncates() {
        // 128 * 100 / 255 = 50.19..., truncated to 50
        assert_eq!(decode_battery_level(&[0x80]).unwrap(), 50);
    }

    #[test]
    fn test_low_battery() {
        // 10 * 100 / 255 = 3.92..., truncated to 3
        assert_eq!(decode_battery_level(&[0x0A]).unwrap(), 3);
    }

    #[test]
    fn test_empty_payload_fails() {
        let err = decode_battery_level(&[]).unwrap_err();
        assert!(matches!(err, ParseError::InvalidPayload(_)));
    }

    #[test]
    fn test_multi_byte_payload_is_big_endian_and_clamped() {
        // 0x0100 = 256; would scale to 100.39, clamped to 100.
        assert_eq!(decode_battery_level(&[0x01, 0x00]).unwrap(), 100);
        // Leading zero byte leaves the value unchanged.
        assert_eq!(decode_battery_level(&[0x00, 0x80]).unwrap(), 50);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn result_is_a_percentage(payload in proptest::collection::vec(any::<u8>(), 1..16)) {
                let percent = decode_battery_level(&payload).unwrap();
                prop_assert!(percent <= 100);
            }

            #[test]
            fn single_byte_scaling_is_monotonic(a: u8, b: u8) {
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                prop_assert!(
                    decode_battery_level(&[lo]).unwrap() <= decode_battery_level(&[hi]).unwrap()
                );
            }
        }
    }
}
