use crate::error::{MqttError, Result};
use bytes::{Buf, BufMut};

/// Encodes a UTF-8 string with a two byte big-endian length prefix.
///
/// # Errors
///
/// Returns an error if the string is longer than 65,535 bytes.
pub fn encode_string<B: BufMut>(buf: &mut B, s: &str) -> Result<()> {
    let len = u16::try_from(s.len()).map_err(|_| MqttError::MalformedPacket(
        format!("string of {} bytes exceeds 65535", s.len()),
    ))?;
    buf.put_u16(len);
    buf.put_slice(s.as_bytes());
    Ok(())
}

/// Decodes a length-prefixed UTF-8 string.
///
/// # Errors
///
/// Returns an error on a truncated buffer or invalid UTF-8.
pub fn decode_string<B: Buf>(buf: &mut B) -> Result<String> {
    if buf.remaining() < 2 {
        return Err(MqttError::MalformedPacket(
            "truncated string length".to_string(),
        ));
    }
    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(MqttError::MalformedPacket(format!(
            "string claims {len} bytes, {} available",
            buf.remaining()
        )));
    }
    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec())
        .map_err(|_| MqttError::MalformedPacket("string is not valid UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn round_trip() {
        let mut buf = BytesMut::new();
        encode_string(&mut buf, "a/b/c").unwrap();
        assert_eq!(&buf[..2], &[0x00, 0x05]);
        assert_eq!(decode_string(&mut buf).unwrap(), "a/b/c");
    }

    #[test]
    fn empty_string() {
        let mut buf = BytesMut::new();
        encode_string(&mut buf, "").unwrap();
        assert_eq!(decode_string(&mut buf).unwrap(), "");
    }

    #[test]
    fn rejects_invalid_utf8() {
        let mut buf = BytesMut::from(&[0x00, 0x02, 0xC3, 0x28][..]);
        assert!(decode_string(&mut buf).is_err());
    }

    #[test]
    fn rejects_truncated_body() {
        let mut buf = BytesMut::from(&[0x00, 0x05, b'a'][..]);
        assert!(decode_string(&mut buf).is_err());
    }
}
