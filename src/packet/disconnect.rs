use crate::error::Result;
use crate::packet::{FixedHeader, MqttPacket, PacketType};
use crate::protocol::v5::properties::Properties;
use crate::protocol::v5::reason_codes::ReasonCode;
use bytes::{Buf, BufMut};

/// MQTT DISCONNECT packet, sent by either side to end the session.
#[derive(Debug, Clone)]
pub struct DisconnectPacket {
    pub reason_code: ReasonCode,
    pub properties: Properties,
}

impl DisconnectPacket {
    #[must_use]
    pub fn new(reason_code: ReasonCode) -> Self {
        Self {
            reason_code,
            properties: Properties::new(),
        }
    }

    /// Normal disconnection without a will message.
    #[must_use]
    pub fn normal() -> Self {
        Self::new(ReasonCode::Success)
    }
}

impl MqttPacket for DisconnectPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Disconnect
    }

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        // Normal disconnection with no properties encodes as an empty body.
        if self.reason_code != ReasonCode::Success || !self.properties.is_empty() {
            buf.put_u8(self.reason_code.into());
            self.properties.encode(buf)?;
        }
        Ok(())
    }

    fn decode_body<B: Buf>(buf: &mut B, _fixed_header: &FixedHeader) -> Result<Self> {
        if !buf.has_remaining() {
            return Ok(Self::normal());
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
    fn normal_disconnect_is_empty_body() {
        let mut buf = BytesMut::new();
        DisconnectPacket::normal().encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0xE0, 0x00]);
    }

    #[test]
    fn reason_and_string_round_trip() {
        let mut packet = DisconnectPacket::new(ReasonCode::SessionTakenOver);
        packet.properties.set_reason_string("session taken over");

        let mut buf = BytesMut::new();
        packet.encode(&mut buf).unwrap();
        let header = FixedHeader::decode(&mut buf).unwrap();
        let decoded = DisconnectPacket::decode_body(&mut buf, &header).unwrap();
        assert_eq!(decoded.reason_code, ReasonCode::SessionTakenOver);
        assert_eq!(
            decoded.properties.reason_string(),
            Some("session taken over")
        );
    }
}
