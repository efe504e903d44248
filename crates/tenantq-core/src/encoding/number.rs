use crate::error::EncodingError;

/// Encode an f64 into 8 bytes that preserve numeric ordering under `memcmp`.
///
/// NaN is rejected and -0.0 is normalized to +0.0. Negative values have all
/// bits flipped; non-negative values have only the sign bit flipped.
pub fn encode_number(value: f64) -> Result<[u8; 8], EncodingError> {
    if value.is_nan() {
        return Err(EncodingError::NaN);
    }

    let value = if value == 0.0 { 0.0_f64 } else { value };
    let mut bits = value.to_bits();

    if bits & (1u64 << 63) != 0 {
        bits = !bits;
    } else {
        bits ^= 1u64 << 63;
    }

    Ok(bits.to_be_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_ordering() {
        let values = [
            f64::NEG_INFINITY,
            -1000.0,
            -1.0,
            -0.5,
            0.0,
            0.5,
            1.0,
            42.0,
            1e10,
            f64::INFINITY,
        ];
        let encoded: Vec<[u8; 8]> = values.iter().map(|v| encode_number(*v).unwrap()).collect();
        for (i, pair) in encoded.windows(2).enumerate() {
            assert!(pair[0] < pair[1], "expected {} < {}", values[i], values[i + 1]);
        }
    }

    #[test]
    fn test_negative_zero_normalized() {
        assert_eq!(encode_number(-0.0).unwrap(), encode_number(0.0).unwrap());
    }

    #[test]
    fn test_nan_rejected() {
        assert_eq!(encode_number(f64::NAN), Err(EncodingError::NaN));
    }
}
