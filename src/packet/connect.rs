use crate::encoding::{decode_binary, decode_string, encode_binary, encode_string};
use crate::error::{MqttError, Result};
use crate::packet::{FixedHeader, MqttPacket, PacketType};
use crate::protocol::v5::properties::Properties;
use crate::types::WillMessage;
use crate::QoS;
use bytes::{Buf, BufMut};

const PROTOCOL_NAME: &str = "MQTT";
const PROTOCOL_LEVEL: u8 = 5;

/// MQTT CONNECT packet: protocol name "MQTT", level 5, plus the client's
/// declared communication properties.
#[derive(Debug, Clone)]
pub struct ConnectPacket {
    pub client_id: String,
    pub clean_start: bool,
    pub keep_alive: u16,
    pub username: Option<String>,
    pub password: Option<Vec<u8>>,
    pub will: Option<WillMessage>,
    pub properties: Properties,
}

impl ConnectPacket {
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            clean_start: true,
            keep_alive: 60,
            username: None,
            password: None,
            will: None,
            properties: Properties::new(),
        }
    }

    fn connect_flags(&self) -> u8 {
        let mut flags = 0u8;
        if self.clean_start {
            flags |= 0x02;
        }
        if let Some(will) = &self.will {
            flags |= 0x04;
            flags |= (will.qos as u8) << 3;
            if will.retain {
                flags |= 0x20;
            }
        }
        if self.password.is_some() {
            flags |= 0x40;
        }
        if self.username.is_some() {
            flags |= 0x80;
        }
        flags
    }
}

impl MqttPacket for ConnectPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Connect
    }

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        encode_string(buf, PROTOCOL_NAME)?;
        buf.put_u8(PROTOCOL_LEVEL);
        buf.put_u8(self.connect_flags());
        buf.put_u16(self.keep_alive);
        self.properties.encode(buf)?;

        encode_string(buf, &self.client_id)?;
        if let Some(will) = &self.will {
            will.properties.encode(buf)?;
            encode_string(buf, &will.topic)?;
            encode_binary(buf, &will.payload)?;
        }
        if let Some(username) = &self.username {
            encode_string(buf, username)?;
        }
        if let Some(password) = &self.password {
            encode_binary(buf, password)?;
        }
        Ok(())
    }

    fn decode_body<B: Buf>(buf: &mut B, _fixed_header: &FixedHeader) -> Result<Self> {
        let protocol_name = decode_string(buf)?;
        if protocol_name != PROTOCOL_NAME {
            return Err(MqttError::MalformedPacket(format!(
                "unexpected protocol name {protocol_name:?}"
            )));
        }
        if buf.remaining() < 4 {
            return Err(MqttError::MalformedPacket("truncated CONNECT".to_string()));
        }
        let level = buf.get_u8();
        if level != PROTOCOL_LEVEL {
            return Err(MqttError::MalformedPacket(format!(
                "unsupported protocol level {level}"
            )));
        }
        let flags = buf.get_u8();
        if flags & 0x01 != 0 {
            return Err(MqttError::MalformedPacket(
                "reserved CONNECT flag set".to_string(),
            ));
        }
        let keep_alive = buf.get_u16();
        let properties = Properties::decode(buf)?;
        let client_id = decode_string(buf)?;

        let will = if flags & 0x04 != 0 {
            let will_properties = Properties::decode(buf)?;
            let topic = decode_string(buf)?;
            let payload = decode_binary(buf)?.to_vec();
            let qos = match (flags >> 3) & 0x03 {
                0 => QoS::AtMostOnce,
                1 => QoS::AtLeastOnce,
                2 => QoS::ExactlyOnce,
                invalid => return Err(MqttError::InvalidQoS(invalid)),
            };
            let mut will = WillMessage::new(topic, payload)
                .with_qos(qos)
                .with_retain(flags & 0x20 != 0);
            will.properties = will_properties;
            Some(will)
        } else {
            None
        };

        let username = if flags & 0x80 != 0 {
            Some(decode_string(buf)?)
        } else {
            None
        };
        let password = if flags & 0x40 != 0 {
            Some(decode_binary(buf)?.to_vec())
        } else {
            None
        };

        Ok(Self {
            client_id,
            clean_start: flags & 0x02 != 0,
            keep_alive,
            username,
            password,
            will,
            properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_connect_round_trips() {
        let mut packet = ConnectPacket::new("c1");
        packet.keep_alive = 30;

        let mut buf = bytes::BytesMut::new();
        packet.encode(&mut buf).unwrap();

        // Fixed header, then the body starts with the protocol name.
        assert_eq!(buf[0], 0x10);
        let header = FixedHeader::decode(&mut buf).unwrap();
        let decoded = ConnectPacket::decode_body(&mut buf, &header).unwrap();
        assert_eq!(decoded.client_id, "c1");
        assert_eq!(decoded.keep_alive, 30);
        assert!(decoded.clean_start);
        assert!(decoded.will.is_none());
        assert!(decoded.username.is_none());
    }

    #[test]
    fn credentials_will_and_properties_round_trip() {
        let mut packet = ConnectPacket::new("c2");
        packet.clean_start = false;
        packet.username = Some("user".into());
        packet.password = Some(b"secret".to_vec());
        packet.properties.set_receive_maximum(12);
        packet.will = Some(
            WillMessage::new("status/offline", b"gone".to_vec())
                .with_qos(QoS::AtLeastOnce)
                .with_retain(true),
        );

        let mut buf = bytes::BytesMut::new();
        packet.encode(&mut buf).unwrap();
        let header = FixedHeader::decode(&mut buf).unwrap();
        let decoded = ConnectPacket::decode_body(&mut buf, &header).unwrap();

        assert!(!decoded.clean_start);
        assert_eq!(decoded.username.as_deref(), Some("user"));
        assert_eq!(decoded.password.as_deref(), Some(&b"secret"[..]));
        assert_eq!(decoded.properties.receive_maximum(), Some(12));
        let will = decoded.will.unwrap();
        assert_eq!(will.topic, "status/offline");
        assert_eq!(will.qos, QoS::AtLeastOnce);
        assert!(will.retain);
    }

    #[test]
    fn rejects_wrong_protocol_level() {
        let packet = ConnectPacket::new("c3");
        let mut buf = bytes::BytesMut::new();
        packet.encode(&mut buf).unwrap();
        let header = FixedHeader::decode(&mut buf).unwrap();
        // Patch the level byte (after the 6 byte protocol name field).
        let mut body = buf.to_vec();
        body[6] = 4;
        let mut body = bytes::BytesMut::from(&body[..]);
        assert!(ConnectPacket::decode_body(&mut body, &header).is_err());
    }
}
