use crate::error::{MqttError, Result};
use crate::packet::{FixedHeader, MqttPacket, PacketType};
use crate::protocol::v5::properties::Properties;
use crate::protocol::v5::reason_codes::ReasonCode;
use bytes::{Buf, BufMut};

/// MQTT CONNACK packet. Its properties carry every server capability the
/// session freezes at handshake completion.
#[derive(Debug, Clone)]
pub struct ConnAckPacket {
    pub session_present: bool,
    pub reason_code: ReasonCode,
    pub properties: Properties,
}

impl ConnAckPacket {
    #[must_use]
    pub fn new(reason_code: ReasonCode) -> Self {
        Self {
            session_present: false,
            reason_code,
            properties: Properties::new(),
        }
    }
}

impl MqttPacket for ConnAckPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::ConnAck
    }

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        buf.put_u8(u8::from(self.session_present));
        buf.put_u8(self.reason_code.into());
        self.properties.encode(buf)
    }

    fn decode_body<B: Buf>(buf: &mut B, _fixed_header: &FixedHeader) -> Result<Self> {
        if buf.remaining() < 2 {
            return Err(MqttError::MalformedPacket("truncated CONNACK".to_string()));
        }
        let ack_flags = buf.get_u8();
        if ack_flags & 0xFE != 0 {
            return Err(MqttError::MalformedPacket(
                "reserved CONNACK flags set".to_string(),
            ));
        }
        let reason_code = ReasonCode::try_from_u8(buf.get_u8())?;
        let properties = if buf.has_remaining() {
            Properties::decode(buf)?
        } else {
            Properties::new()
        };
        Ok(Self {
            session_present: ack_flags & 0x01 != 0,
            reason_code,
            properties,
        })
    }
}
