use crate::error::Result;
use crate::packet::puback::decode_ack_body;
use crate::packet::{FixedHeader, MqttPacket, PacketType};
use crate::protocol::v5::properties::Properties;
use crate::protocol::v5::reason_codes::ReasonCode;
use bytes::{Buf, BufMut};

/// MQTT PUBCOMP packet, the terminal step of a QoS 2 exchange.
#[derive(Debug, Clone)]
pub struct PubCompPacket {
    pub packet_id: u16,
    pub reason_code: ReasonCode,
    pub properties: Properties,
}

impl PubCompPacket {
    #[must_use]
    pub fn new(packet_id: u16) -> Self {
        Self {
            packet_id,
            reason_code: ReasonCode::Success,
            properties: Properties::new(),
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason_code: ReasonCode) -> Self {
        self.reason_code = reason_code;
        self
    }
}

impl MqttPacket for PubCompPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::PubComp
    }

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        buf.put_u16(self.packet_id);
        if self.reason_code != ReasonCode::Success || !self.properties.is_empty() {
            buf.put_u8(self.reason_code.into());
            self.properties.encode(buf)?;
        }
        Ok(())
    }

    fn decode_body<B: Buf>(buf: &mut B, _fixed_header: &FixedHeader) -> Result<Self> {
        let (packet_id, reason_code, properties) = decode_ack_body(buf)?;
        Ok(Self {
            packet_id,
            reason_code,
            properties,
        })
    }
}
