use crate::error::{MqttError, Result};
use bytes::{Buf, BufMut, Bytes};

/// Encodes binary data with a two byte big-endian length prefix.
///
/// # Errors
///
/// Returns an error if the data is longer than 65,535 bytes.
pub fn encode_binary<B: BufMut>(buf: &mut B, data: &[u8]) -> Result<()> {
    let len = u16::try_from(data.len()).map_err(|_| MqttError::MalformedPacket(
        format!("binary field of {} bytes exceeds 65535", data.len()),
    ))?;
    buf.put_u16(len);
    buf.put_slice(data);
    Ok(())
}

/// Decodes a length-prefixed binary field.
///
/// # Errors
///
/// Returns an error on a truncated buffer.
pub fn decode_binary<B: Buf>(buf: &mut B) -> Result<Bytes> {
    if buf.remaining() < 2 {
        return Err(MqttError::MalformedPacket(
            "truncated binary length".to_string(),
        ));
    }
    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(MqttError::MalformedPacket(format!(
            "binary field claims {len} bytes, {} available",
            buf.remaining()
        )));
    }
    Ok(buf.copy_to_bytes(len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn round_trip() {
        let mut buf = BytesMut::new();
        encode_binary(&mut buf, &[1, 2, 3]).unwrap();
        assert_eq!(decode_binary(&mut buf).unwrap(), Bytes::from_static(&[1, 2, 3]));
    }

    #[test]
    fn rejects_truncated_body() {
        let mut buf = BytesMut::from(&[0x00, 0x04, 0xAA][..]);
        assert!(decode_binary(&mut buf).is_err());
    }
}
