use crate::error::{MqttError, Result};
use bytes::{Buf, BufMut};

/// Largest value representable as a variable byte integer (268,435,455).
pub const VARIABLE_BYTE_INT_MAX: u32 = 268_435_455;

/// Encodes a value as an MQTT variable byte integer (1 to 4 bytes, 7 data
/// bits per byte, high bit as continuation).
///
/// # Errors
///
/// Returns `MqttError::MalformedPacket` if the value exceeds
/// [`VARIABLE_BYTE_INT_MAX`].
pub fn encode_variable_int<B: BufMut>(buf: &mut B, value: u32) -> Result<()> {
    if value > VARIABLE_BYTE_INT_MAX {
        return Err(MqttError::MalformedPacket(format!(
            "variable byte integer {value} exceeds maximum {VARIABLE_BYTE_INT_MAX}"
        )));
    }

    let mut val = value;
    loop {
        let mut byte = (val % 128) as u8;
        val /= 128;
        if val > 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        if val == 0 {
            return Ok(());
        }
    }
}

/// Decodes a variable byte integer.
///
/// # Errors
///
/// Returns an error on a truncated buffer or when the encoding uses more
/// than 4 bytes.
pub fn decode_variable_int<B: Buf>(buf: &mut B) -> Result<u32> {
    let mut value = 0u32;
    let mut multiplier = 1u32;

    for count in 0.. {
        if count == 4 {
            return Err(MqttError::MalformedPacket(
                "variable byte integer exceeds 4 bytes".to_string(),
            ));
        }
        if !buf.has_remaining() {
            return Err(MqttError::MalformedPacket(
                "truncated variable byte integer".to_string(),
            ));
        }

        let byte = buf.get_u8();
        value += u32::from(byte & 0x7F) * multiplier;
        if byte & 0x80 == 0 {
            break;
        }
        multiplier *= 128;
    }

    Ok(value)
}

/// Number of bytes [`encode_variable_int`] produces for `value`.
#[must_use]
pub fn variable_int_len(value: u32) -> usize {
    match value {
        0..=127 => 1,
        128..=16_383 => 2,
        16_384..=2_097_151 => 3,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn boundary_values() {
        for (value, len) in [
            (0u32, 1usize),
            (127, 1),
            (128, 2),
            (16_383, 2),
            (16_384, 3),
            (2_097_151, 3),
            (2_097_152, 4),
            (VARIABLE_BYTE_INT_MAX, 4),
        ] {
            let mut buf = BytesMut::new();
            encode_variable_int(&mut buf, value).unwrap();
            assert_eq!(buf.len(), len, "encoded length for {value}");
            assert_eq!(variable_int_len(value), len);
            assert_eq!(decode_variable_int(&mut buf).unwrap(), value);
        }
    }

    #[test]
    fn known_wire_form() {
        let mut buf = BytesMut::new();
        encode_variable_int(&mut buf, 321).unwrap();
        assert_eq!(&buf[..], &[0xC1, 0x02]);
    }

    #[test]
    fn rejects_oversized_value() {
        let mut buf = BytesMut::new();
        assert!(encode_variable_int(&mut buf, VARIABLE_BYTE_INT_MAX + 1).is_err());
    }

    #[test]
    fn rejects_overlong_encoding() {
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0xFF, 0xFF, 0x01][..]);
        assert!(decode_variable_int(&mut buf).is_err());
    }

    #[test]
    fn rejects_truncation() {
        let mut buf = BytesMut::from(&[0x80][..]);
        assert!(decode_variable_int(&mut buf).is_err());
    }
}
