use crate::error::{MqttError, Result};
use crate::packet::{FixedHeader, MqttPacket, PacketType};
use crate::protocol::v5::properties::Properties;
use crate::protocol::v5::reason_codes::ReasonCode;
use bytes::{Buf, BufMut};

/// MQTT PUBACK packet, the QoS 1 acknowledgement.
#[derive(Debug, Clone)]
pub struct PubAckPacket {
    pub packet_id: u16,
    pub reason_code: ReasonCode,
    pub properties: Properties,
}

impl PubAckPacket {
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

impl MqttPacket for PubAckPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::PubAck
    }

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        buf.put_u16(self.packet_id);
        // A success code with no properties may be elided entirely.
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

/// Shared body layout for PUBACK, PUBREC, PUBREL and PUBCOMP: packet id,
/// then optional reason code, then optional properties.
pub(crate) fn decode_ack_body<B: Buf>(buf: &mut B) -> Result<(u16, ReasonCode, Properties)> {
    if buf.remaining() < 2 {
        return Err(MqttError::MalformedPacket(
            "acknowledgement shorter than a packet id".to_string(),
        ));
    }
    let packet_id = buf.get_u16();
    if !buf.has_remaining() {
        return Ok((packet_id, ReasonCode::Success, Properties::new()));
    }
    let reason_code = ReasonCode::try_from_u8(buf.get_u8())?;
    let properties = if buf.has_remaining() {
        Properties::decode(buf)?
    } else {
        Properties::new()
    };
    Ok((packet_id, reason_code, properties))
}
