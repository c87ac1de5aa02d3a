use crate::encoding::{decode_string, encode_string};
use crate::error::{MqttError, Result};
use crate::packet::{FixedHeader, MqttPacket, PacketType};
use crate::protocol::v5::properties::Properties;
use crate::QoS;
use bytes::{Buf, BufMut};

/// Retained message forwarding behavior requested at subscribe time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetainHandling {
    #[default]
    SendAtSubscribe = 0,
    SendIfNew = 1,
    DontSend = 2,
}

/// Per-filter subscription options, packed into one byte on the wire.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscriptionOptions {
    pub qos: QoS,
    pub no_local: bool,
    pub retain_as_published: bool,
    pub retain_handling: RetainHandling,
}

impl SubscriptionOptions {
    #[must_use]
    pub fn with_qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    fn to_byte(self) -> u8 {
        let mut byte = self.qos as u8;
        if self.no_local {
            byte |= 0x04;
        }
        if self.retain_as_published {
            byte |= 0x08;
        }
        byte | ((self.retain_handling as u8) << 4)
    }

    fn from_byte(byte: u8) -> Result<Self> {
        if byte & 0xC0 != 0 {
            return Err(MqttError::MalformedPacket(
                "reserved subscription option bits set".to_string(),
            ));
        }
        let qos = match byte & 0x03 {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            2 => QoS::ExactlyOnce,
            invalid => return Err(MqttError::InvalidQoS(invalid)),
        };
        let retain_handling = match (byte >> 4) & 0x03 {
            0 => RetainHandling::SendAtSubscribe,
            1 => RetainHandling::SendIfNew,
            2 => RetainHandling::DontSend,
            _ => {
                return Err(MqttError::MalformedPacket(
                    "invalid retain handling".to_string(),
                ))
            }
        };
        Ok(Self {
            qos,
            no_local: byte & 0x04 != 0,
            retain_as_published: byte & 0x08 != 0,
            retain_handling,
        })
    }
}

/// One topic filter plus its options.
#[derive(Debug, Clone)]
pub struct TopicFilter {
    pub filter: String,
    pub options: SubscriptionOptions,
}

impl TopicFilter {
    #[must_use]
    pub fn new(filter: impl Into<String>, options: SubscriptionOptions) -> Self {
        Self {
            filter: filter.into(),
            options,
        }
    }
}

/// MQTT SUBSCRIBE packet. The packet id is assigned by the session when the
/// request is sent.
#[derive(Debug, Clone)]
pub struct SubscribePacket {
    pub packet_id: u16,
    pub properties: Properties,
    pub filters: Vec<TopicFilter>,
}

impl SubscribePacket {
    #[must_use]
    pub fn new(filters: Vec<TopicFilter>) -> Self {
        Self {
            packet_id: 0,
            properties: Properties::new(),
            filters,
        }
    }

    #[must_use]
    pub fn with_subscription_identifier(mut self, id: u32) -> Self {
        self.properties.add_subscription_identifier(id);
        self
    }
}

impl MqttPacket for SubscribePacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Subscribe
    }

    fn flags(&self) -> u8 {
        0x02
    }

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        buf.put_u16(self.packet_id);
        self.properties.encode(buf)?;
        for entry in &self.filters {
            encode_string(buf, &entry.filter)?;
            buf.put_u8(entry.options.to_byte());
        }
        Ok(())
    }

    fn decode_body<B: Buf>(buf: &mut B, _fixed_header: &FixedHeader) -> Result<Self> {
        if buf.remaining() < 2 {
            return Err(MqttError::MalformedPacket("truncated SUBSCRIBE".to_string()));
        }
        let packet_id = buf.get_u16();
        let properties = Properties::decode(buf)?;
        let mut filters = Vec::new();
        while buf.has_remaining() {
            let filter = decode_string(buf)?;
            if !buf.has_remaining() {
                return Err(MqttError::MalformedPacket(
                    "filter without subscription options".to_string(),
                ));
            }
            let options = SubscriptionOptions::from_byte(buf.get_u8())?;
            filters.push(TopicFilter { filter, options });
        }
        if filters.is_empty() {
            return Err(MqttError::MalformedPacket(
                "SUBSCRIBE with no filters".to_string(),
            ));
        }
        Ok(Self {
            packet_id,
            properties,
            filters,
        })
    }
}
