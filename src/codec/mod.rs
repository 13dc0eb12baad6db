/*
    Conversions between Modbus register words and the engineering values
    the meters expose. Every multi word value is big endian, the first word
    carries the high 16 bits.
*/

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error("expected {expected} register words, got {got}")]
    WordCount { expected: usize, got: usize },
    #[error("no register words to decode")]
    Empty,
    #[error("value {0} can not be encoded as a finite 32 bit float")]
    NonFinite(f64),
    #[error("value {value} does not fit into {bits} bits")]
    OutOfRange { value: u64, bits: u32 },
    #[error("{0} can not be written as {1}")]
    Incompatible(String, String),
}

fn expect_words(words: &[u16], expected: usize) -> Result<(), EncodingError> {
    if words.len() != expected {
        return Err(EncodingError::WordCount { expected, got: words.len() });
    }
    Ok(())
}

fn join_words(words: &[u16]) -> Result<u32, EncodingError> {
    expect_words(words, 2)?;
    return Ok(u32::from(words[0]) << 16 | u32::from(words[1]));
}

fn split_words(value: u32) -> [u16; 2] {
    return [(value >> 16) as u16, (value & 0xffff) as u16];
}

/// IEEE 754 single precision float spread over two words
pub fn decode_float32(words: &[u16]) -> Result<f32, EncodingError> {
    return Ok(f32::from_bits(join_words(words)?));
}

/// Inverse of [`decode_float32`]. Wider floats are rounded to f32 first.
pub fn encode_float32(value: f64) -> Result<[u16; 2], EncodingError> {
    let narrowed = value as f32;
    if !value.is_finite() || !narrowed.is_finite() {
        return Err(EncodingError::NonFinite(value));
    }
    return Ok(split_words(narrowed.to_bits()));
}

pub fn decode_uint32(words: &[u16]) -> Result<u32, EncodingError> {
    return join_words(words);
}

pub fn encode_uint32(value: u64) -> Result<[u16; 2], EncodingError> {
    let value = u32::try_from(value).map_err(|_| EncodingError::OutOfRange { value, bits: 32 })?;
    return Ok(split_words(value));
}

/// First word verbatim, any further words are ignored
pub fn decode_uint16(words: &[u16]) -> Result<u16, EncodingError> {
    return words.first().copied().ok_or(EncodingError::Empty);
}

/// Every word as 16 zero padded binary digits, in word order
pub fn decode_binary(words: &[u16]) -> Result<String, EncodingError> {
    if words.is_empty() {
        return Err(EncodingError::Empty);
    }
    return Ok(words.iter().map(|w| format!("{:016b}", w)).collect());
}

/// Every word as lowercase hex without padding, concatenated.
///
/// Words are not padded to four digits, so `[0x1, 0x2345]` and
/// `[0x12, 0x345]` render the same. Do not parse this back into words.
pub fn decode_hex(words: &[u16]) -> Result<String, EncodingError> {
    if words.is_empty() {
        return Err(EncodingError::Empty);
    }
    return Ok(words.iter().map(|w| format!("{:x}", w)).collect());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_float32_voltage() {
        /* 230.0 V as sent by an SDM120 */
        assert_eq!(decode_float32(&[0x4366, 0x0000]).unwrap(), 230.0);
        assert_eq!(decode_float32(&[0xc2f6, 0xe979]).unwrap(), -123.456);
    }

    #[test]
    fn test_float32_inverse() {
        for value in [0.0f32, -0.0, 1.5, 49.98, 230.1, f32::MAX, f32::MIN_POSITIVE, 1.0e-44] {
            let words = encode_float32(value as f64).unwrap();
            assert_eq!(decode_float32(&words).unwrap().to_bits(), value.to_bits());
        }
    }

    #[test]
    fn test_encode_float32_rounds_wide_values() {
        let wide = 0.1f64;
        assert_eq!(decode_float32(&encode_float32(wide).unwrap()).unwrap(), 0.1f32);
    }

    #[test]
    fn test_encode_float32_rejects_non_finite() {
        assert!(matches!(encode_float32(f64::NAN), Err(EncodingError::NonFinite(_))));
        assert!(matches!(encode_float32(f64::INFINITY), Err(EncodingError::NonFinite(_))));
        /* finite as f64 but overflows f32 */
        assert!(matches!(encode_float32(1.0e300), Err(EncodingError::NonFinite(_))));
    }

    #[test]
    fn test_uint32() {
        assert_eq!(decode_uint32(&[0x1234, 0x5678]).unwrap(), 305419896);
        assert_eq!(encode_uint32(305419896).unwrap(), [0x1234, 0x5678]);
        assert_eq!(decode_uint32(&encode_uint32(u32::MAX as u64).unwrap()).unwrap(), u32::MAX);
        assert_eq!(decode_uint32(&encode_uint32(0).unwrap()).unwrap(), 0);
        assert_eq!(encode_uint32(1 << 32), Err(EncodingError::OutOfRange { value: 1 << 32, bits: 32 }));
    }

    #[test]
    fn test_uint16() {
        assert_eq!(decode_uint16(&[9600]).unwrap(), 9600);
        assert_eq!(decode_uint16(&[1, 2]), Ok(1));
        assert_eq!(decode_uint16(&[]), Err(EncodingError::Empty));
    }

    #[test]
    fn test_decode_binary() {
        assert_eq!(decode_binary(&[1, 257]).unwrap(), "0000000000000001".to_string() + "0000000100000001");
        assert_eq!(decode_binary(&[0x5555]).unwrap(), "0101010101010101");
        assert_eq!(decode_binary(&[]), Err(EncodingError::Empty));
    }

    #[test]
    fn test_decode_hex_is_not_padded() {
        assert_eq!(decode_hex(&[0x1234, 0x5678]).unwrap(), "12345678");
        assert_eq!(decode_hex(&[0x1, 0x2345]).unwrap(), "12345");
        assert_eq!(decode_hex(&[0x12, 0x345]).unwrap(), "12345");
    }

    #[test]
    fn test_wrong_word_count() {
        assert_eq!(decode_float32(&[1]), Err(EncodingError::WordCount { expected: 2, got: 1 }));
        assert_eq!(decode_uint32(&[1, 2, 3]), Err(EncodingError::WordCount { expected: 2, got: 3 }));
    }
}
