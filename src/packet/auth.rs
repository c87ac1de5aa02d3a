use crate::error::Result;
use crate::packet::{FixedHeader, MqttPacket, PacketType};
use crate::protocol::v5::properties::Properties;
use crate::protocol::v5::reason_codes::ReasonCode;
use bytes::{Buf, BufMut};

/// MQTT AUTH packet carrying one round of an enhanced authentication
/// exchange. The reason code distinguishes a continued challenge (0x18), a
/// client-initiated re-authentication (0x19) and final success (0x00).
#[derive(Debug, Clone)]
pub struct AuthPacket {
    pub reason_code: ReasonCode,
    pub properties: Properties,
}

impl AuthPacket {
    #[must_use]
    pub fn new(reason_code: ReasonCode) -> Self {
        Self {
            reason_code,
            properties: Properties::new(),
        }
    }

    #[must_use]
    pub fn continue_authentication() -> Self {
        Self::new(ReasonCode::ContinueAuthentication)
    }

    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.properties.set_authentication_method(method);
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: impl Into<bytes::Bytes>) -> Self {
        self.properties.set_authentication_data(data);
        self
    }
}

impl MqttPacket for AuthPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Auth
    }

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        // Success with no properties encodes as an empty body.
        if self.reason_code != ReasonCode::Success || !self.properties.is_empty() {
            buf.put_u8(self.reason_code.into());
            self.properties.encode(buf)?;
        }
        Ok(())
    }

    fn decode_body<B: Buf>(buf: &mut B, _fixed_header: &FixedHeader) -> Result<Self> {
        if !buf.has_remaining() {
            return Ok(Self::new(ReasonCode::Success));
        }
        let reason_code = ReasonCode::try_from_u8(buf.get_u8())?;
        let properties = if buf.has_remaining() {
            Properties::decode(buf)?
        } else {
            Properties::new()
        };
        Ok(Self {
            reason_code,
            properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn challenge_round_trip() {
        let packet = AuthPacket::continue_authentication()
            .with_method("SCRAM-SHA-1")
            .with_data(&b"client-first"[..]);

        let mut buf = BytesMut::new();
        packet.encode(&mut buf).unwrap();
        let header = FixedHeader::decode(&mut buf).unwrap();
        let decoded = AuthPacket::decode_body(&mut buf, &header).unwrap();
        assert_eq!(decoded.reason_code, ReasonCode::ContinueAuthentication);
        assert_eq!(decoded.properties.authentication_method(), Some("SCRAM-SHA-1"));
        assert_eq!(
            decoded.properties.authentication_data().map(|b| &b[..]),
            Some(&b"client-first"[..])
        );
    }

    #[test]
    fn success_is_empty_body() {
        let mut buf = BytesMut::new();
        AuthPacket::new(ReasonCode::Success).encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0xF0, 0x00]);

        let header = FixedHeader::decode(&mut buf).unwrap();
        let decoded = AuthPacket::decode_body(&mut buf, &header).unwrap();
        assert_eq!(decoded.reason_code, ReasonCode::Success);
    }
}
