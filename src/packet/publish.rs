use crate::encoding::{decode_string, encode_string};
use crate::error::{MqttError, Result};
use crate::packet::{FixedHeader, MqttPacket, PacketType};
use crate::protocol::v5::properties::Properties;
use crate::QoS;
use bytes::{Buf, BufMut};

/// MQTT PUBLISH packet. DUP, QoS and RETAIN travel in the fixed header
/// flags; the packet id is present only for QoS above 0.
#[derive(Debug, Clone)]
pub struct PublishPacket {
    pub topic_name: String,
    pub packet_id: Option<u16>,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
    pub dup: bool,
    pub properties: Properties,
}

impl PublishPacket {
    #[must_use]
    pub fn new(topic_name: impl Into<String>, payload: impl Into<Vec<u8>>, qos: QoS) -> Self {
        Self {
            topic_name: topic_name.into(),
            packet_id: None,
            payload: payload.into(),
            qos,
            retain: false,
            dup: false,
            properties: Properties::new(),
        }
    }

    #[must_use]
    pub fn with_retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    #[must_use]
    pub fn with_topic_alias(mut self, alias: u16) -> Self {
        self.properties.set_topic_alias(alias);
        self
    }

    #[must_use]
    pub fn with_response_topic(mut self, topic: impl Into<String>) -> Self {
        self.properties.set_response_topic(topic);
        self
    }

    #[must_use]
    pub fn with_correlation_data(mut self, data: impl Into<bytes::Bytes>) -> Self {
        self.properties.set_correlation_data(data);
        self
    }

    #[must_use]
    pub fn with_user_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.add_user_property(key, value);
        self
    }
}

impl MqttPacket for PublishPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Publish
    }

    fn flags(&self) -> u8 {
        let mut flags = (self.qos as u8) << 1;
        if self.dup {
            flags |= 0x08;
        }
        if self.retain {
            flags |= 0x01;
        }
        flags
    }

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        encode_string(buf, &self.topic_name)?;
        if self.qos != QoS::AtMostOnce {
            let packet_id = self.packet_id.ok_or_else(|| {
                MqttError::MalformedPacket("packet id required for QoS above 0".to_string())
            })?;
            buf.put_u16(packet_id);
        }
        self.properties.encode(buf)?;
        buf.put_slice(&self.payload);
        Ok(())
    }

    fn decode_body<B: Buf>(buf: &mut B, fixed_header: &FixedHeader) -> Result<Self> {
        let flags = fixed_header.flags;
        let qos = match (flags >> 1) & 0x03 {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            2 => QoS::ExactlyOnce,
            invalid => return Err(MqttError::InvalidQoS(invalid)),
        };

        let topic_name = decode_string(buf)?;
        let packet_id = if qos == QoS::AtMostOnce {
            None
        } else {
            if buf.remaining() < 2 {
                return Err(MqttError::MalformedPacket(
                    "missing packet identifier".to_string(),
                ));
            }
            Some(buf.get_u16())
        };
        let properties = Properties::decode(buf)?;
        let payload = buf.copy_to_bytes(buf.remaining()).to_vec();

        Ok(Self {
            topic_name,
            packet_id,
            payload,
            qos,
            retain: flags & 0x01 != 0,
            dup: flags & 0x08 != 0,
            properties,
        })
    }
}
