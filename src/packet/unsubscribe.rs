use crate::encoding::{decode_string, encode_string};
use crate::error::{MqttError, Result};
use crate::packet::{FixedHeader, MqttPacket, PacketType};
use crate::protocol::v5::properties::Properties;
use bytes::{Buf, BufMut};

/// MQTT UNSUBSCRIBE packet. The packet id is assigned by the session when
/// the request is sent.
#[derive(Debug, Clone)]
pub struct UnsubscribePacket {
    pub packet_id: u16,
    pub properties: Properties,
    pub filters: Vec<String>,
}

impl UnsubscribePacket {
    #[must_use]
    pub fn new(filters: Vec<String>) -> Self {
        Self {
            packet_id: 0,
            properties: Properties::new(),
            filters,
        }
    }
}

impl MqttPacket for UnsubscribePacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Unsubscribe
    }

    fn flags(&self) -> u8 {
        0x02
    }

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        buf.put_u16(self.packet_id);
        self.properties.encode(buf)?;
        for filter in &self.filters {
            encode_string(buf, filter)?;
        }
        Ok(())
    }

    fn decode_body<B: Buf>(buf: &mut B, _fixed_header: &FixedHeader) -> Result<Self> {
        if buf.remaining() < 2 {
            return Err(MqttError::MalformedPacket(
                "truncated UNSUBSCRIBE".to_string(),
            ));
        }
        let packet_id = buf.get_u16();
        let properties = Properties::decode(buf)?;
        let mut filters = Vec::new();
        while buf.has_remaining() {
            filters.push(decode_string(buf)?);
        }
        if filters.is_empty() {
            return Err(MqttError::MalformedPacket(
                "UNSUBSCRIBE with no filters".to_string(),
            ));
        }
        Ok(Self {
            packet_id,
            properties,
            filters,
        })
    }
}
