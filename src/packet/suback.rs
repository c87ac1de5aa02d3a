use crate::error::{MqttError, Result};
use crate::packet::{FixedHeader, MqttPacket, PacketType};
use crate::protocol::v5::properties::Properties;
use crate::protocol::v5::reason_codes::ReasonCode;
use bytes::{Buf, BufMut};

/// MQTT SUBACK packet: one reason code per requested filter, in order.
#[derive(Debug, Clone)]
pub struct SubAckPacket {
    pub packet_id: u16,
    pub properties: Properties,
    pub reason_codes: Vec<ReasonCode>,
}

impl SubAckPacket {
    #[must_use]
    pub fn new(packet_id: u16, reason_codes: Vec<ReasonCode>) -> Self {
        Self {
            packet_id,
            properties: Properties::new(),
            reason_codes,
        }
    }
}

impl MqttPacket for SubAckPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::SubAck
    }

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        buf.put_u16(self.packet_id);
        self.properties.encode(buf)?;
        for code in &self.reason_codes {
            buf.put_u8((*code).into());
        }
        Ok(())
    }

    fn decode_body<B: Buf>(buf: &mut B, _fixed_header: &FixedHeader) -> Result<Self> {
        if buf.remaining() < 2 {
            return Err(MqttError::MalformedPacket("truncated SUBACK".to_string()));
        }
        let packet_id = buf.get_u16();
        let properties = Properties::decode(buf)?;
        let mut reason_codes = Vec::with_capacity(buf.remaining());
        while buf.has_remaining() {
            reason_codes.push(ReasonCode::try_from_u8(buf.get_u8())?);
        }
        if reason_codes.is_empty() {
            return Err(MqttError::MalformedPacket(
                "SUBACK with no reason codes".to_string(),
            ));
        }
        Ok(Self {
            packet_id,
            properties,
            reason_codes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::v5::reason_codes::GRANTED_QOS_0;

    #[test]
    fn mixed_reason_vector_round_trips() {
        let packet = SubAckPacket::new(
            17,
            vec![
                GRANTED_QOS_0,
                ReasonCode::GrantedQoS2,
                ReasonCode::NotAuthorized,
            ],
        );

        let mut buf = bytes::BytesMut::new();
        packet.encode(&mut buf).unwrap();
        let header = FixedHeader::decode(&mut buf).unwrap();
        let decoded = SubAckPacket::decode_body(&mut buf, &header).unwrap();
        assert_eq!(decoded.packet_id, 17);
        assert_eq!(
            decoded.reason_codes,
            vec![
                ReasonCode::Success,
                ReasonCode::GrantedQoS2,
                ReasonCode::NotAuthorized
            ]
        );
    }
}
