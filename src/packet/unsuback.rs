use crate::error::{MqttError, Result};
use crate::packet::{FixedHeader, MqttPacket, PacketType};
use crate::protocol::v5::properties::Properties;
use crate::protocol::v5::reason_codes::ReasonCode;
use bytes::{Buf, BufMut};

/// MQTT UNSUBACK packet: one reason code per requested filter, in order.
#[derive(Debug, Clone)]
pub struct UnsubAckPacket {
    pub packet_id: u16,
    pub properties: Properties,
    pub reason_codes: Vec<ReasonCode>,
}

impl UnsubAckPacket {
    #[must_use]
    pub fn new(packet_id: u16, reason_codes: Vec<ReasonCode>) -> Self {
        Self {
            packet_id,
            properties: Properties::new(),
            reason_codes,
        }
    }
}

impl MqttPacket for UnsubAckPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::UnsubAck
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
            return Err(MqttError::MalformedPacket("truncated UNSUBACK".to_string()));
        }
        let packet_id = buf.get_u16();
        let properties = Properties::decode(buf)?;
        let mut reason_codes = Vec::with_capacity(buf.remaining());
        while buf.has_remaining() {
            reason_codes.push(ReasonCode::try_from_u8(buf.get_u8())?);
        }
        if reason_codes.is_empty() {
            return Err(MqttError::MalformedPacket(
                "UNSUBACK with no reason codes".to_string(),
            ));
        }
        Ok(Self {
            packet_id,
            properties,
            reason_codes,
        })
    }
}
