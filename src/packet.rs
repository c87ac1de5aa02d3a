//! Typed MQTT v5 control packets and their wire codec.
//!
//! Each packet type lives in its own module and implements [`MqttPacket`];
//! [`Packet`] is the dynamic union the session and the demultiplexer work
//! with.

pub mod auth;
pub mod connack;
pub mod connect;
pub mod disconnect;
pub mod puback;
pub mod pubcomp;
pub mod publish;
pub mod pubrec;
pub mod pubrel;
pub mod suback;
pub mod subscribe;
pub mod unsuback;
pub mod unsubscribe;

use crate::encoding::{decode_variable_int, encode_variable_int};
use crate::error::{MqttError, Result};
use bytes::{Buf, BufMut};

/// Control packet type, the high nibble of the fixed header's first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Connect = 1,
    ConnAck = 2,
    Publish = 3,
    PubAck = 4,
    PubRec = 5,
    PubRel = 6,
    PubComp = 7,
    Subscribe = 8,
    SubAck = 9,
    Unsubscribe = 10,
    UnsubAck = 11,
    PingReq = 12,
    PingResp = 13,
    Disconnect = 14,
    Auth = 15,
}

impl PacketType {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Connect),
            2 => Some(Self::ConnAck),
            3 => Some(Self::Publish),
            4 => Some(Self::PubAck),
            5 => Some(Self::PubRec),
            6 => Some(Self::PubRel),
            7 => Some(Self::PubComp),
            8 => Some(Self::Subscribe),
            9 => Some(Self::SubAck),
            10 => Some(Self::Unsubscribe),
            11 => Some(Self::UnsubAck),
            12 => Some(Self::PingReq),
            13 => Some(Self::PingResp),
            14 => Some(Self::Disconnect),
            15 => Some(Self::Auth),
            _ => None,
        }
    }
}

impl From<PacketType> for u8 {
    fn from(packet_type: PacketType) -> Self {
        packet_type as u8
    }
}

/// MQTT fixed header: packet type, four flag bits, and the body length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeader {
    pub packet_type: PacketType,
    pub flags: u8,
    pub remaining_length: u32,
}

impl FixedHeader {
    #[must_use]
    pub fn new(packet_type: PacketType, flags: u8, remaining_length: u32) -> Self {
        Self {
            packet_type,
            flags,
            remaining_length,
        }
    }

    /// Encodes the type/flags byte and the remaining length.
    ///
    /// # Errors
    ///
    /// Returns an error if the remaining length exceeds the variable byte
    /// integer range.
    pub fn encode<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        buf.put_u8((u8::from(self.packet_type) << 4) | (self.flags & 0x0F));
        encode_variable_int(buf, self.remaining_length)
    }

    /// Decodes a fixed header.
    ///
    /// # Errors
    ///
    /// Returns an error on a truncated buffer or an unknown packet type.
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        if !buf.has_remaining() {
            return Err(MqttError::MalformedPacket(
                "no data for fixed header".to_string(),
            ));
        }
        let byte = buf.get_u8();
        let packet_type =
            PacketType::from_u8(byte >> 4).ok_or(MqttError::InvalidPacketType(byte >> 4))?;
        let flags = byte & 0x0F;
        let remaining_length = decode_variable_int(buf)?;
        Ok(Self {
            packet_type,
            flags,
            remaining_length,
        })
    }

    /// PUBLISH carries free-form flags; PUBREL, SUBSCRIBE and UNSUBSCRIBE
    /// require 0x02; everything else requires zero.
    #[must_use]
    pub fn validate_flags(&self) -> bool {
        match self.packet_type {
            PacketType::Publish => true,
            PacketType::PubRel | PacketType::Subscribe | PacketType::Unsubscribe => {
                self.flags == 0x02
            }
            _ => self.flags == 0,
        }
    }
}

/// Common codec surface for every control packet.
pub trait MqttPacket: Sized {
    fn packet_type(&self) -> PacketType;

    fn flags(&self) -> u8 {
        0
    }

    /// Encodes the variable header and payload, without the fixed header.
    ///
    /// # Errors
    ///
    /// Returns an error when a field cannot be represented on the wire.
    fn encode_body<B: BufMut>(&self, buf: &mut B) -> Result<()>;

    /// Decodes the variable header and payload. `buf` holds exactly
    /// `fixed_header.remaining_length` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed input.
    fn decode_body<B: Buf>(buf: &mut B, fixed_header: &FixedHeader) -> Result<Self>;

    /// Encodes the complete packet including the fixed header.
    ///
    /// # Errors
    ///
    /// Returns an error when encoding the body fails.
    fn encode<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        let mut body = Vec::new();
        self.encode_body(&mut body)?;
        FixedHeader::new(self.packet_type(), self.flags(), body.len() as u32).encode(buf)?;
        buf.put_slice(&body);
        Ok(())
    }
}

/// Union of all control packets.
#[derive(Debug, Clone)]
pub enum Packet {
    Connect(Box<connect::ConnectPacket>),
    ConnAck(connack::ConnAckPacket),
    Publish(publish::PublishPacket),
    PubAck(puback::PubAckPacket),
    PubRec(pubrec::PubRecPacket),
    PubRel(pubrel::PubRelPacket),
    PubComp(pubcomp::PubCompPacket),
    Subscribe(subscribe::SubscribePacket),
    SubAck(suback::SubAckPacket),
    Unsubscribe(unsubscribe::UnsubscribePacket),
    UnsubAck(unsuback::UnsubAckPacket),
    PingReq,
    PingResp,
    Disconnect(disconnect::DisconnectPacket),
    Auth(auth::AuthPacket),
}

impl Packet {
    #[must_use]
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Connect(_) => PacketType::Connect,
            Packet::ConnAck(_) => PacketType::ConnAck,
            Packet::Publish(_) => PacketType::Publish,
            Packet::PubAck(_) => PacketType::PubAck,
            Packet::PubRec(_) => PacketType::PubRec,
            Packet::PubRel(_) => PacketType::PubRel,
            Packet::PubComp(_) => PacketType::PubComp,
            Packet::Subscribe(_) => PacketType::Subscribe,
            Packet::SubAck(_) => PacketType::SubAck,
            Packet::Unsubscribe(_) => PacketType::Unsubscribe,
            Packet::UnsubAck(_) => PacketType::UnsubAck,
            Packet::PingReq => PacketType::PingReq,
            Packet::PingResp => PacketType::PingResp,
            Packet::Disconnect(_) => PacketType::Disconnect,
            Packet::Auth(_) => PacketType::Auth,
        }
    }

    /// The packet identifier binding a request to its responses, when the
    /// packet type carries one.
    #[must_use]
    pub fn packet_id(&self) -> Option<u16> {
        match self {
            Packet::Publish(p) => p.packet_id,
            Packet::PubAck(p) => Some(p.packet_id),
            Packet::PubRec(p) => Some(p.packet_id),
            Packet::PubRel(p) => Some(p.packet_id),
            Packet::PubComp(p) => Some(p.packet_id),
            Packet::Subscribe(p) => Some(p.packet_id),
            Packet::SubAck(p) => Some(p.packet_id),
            Packet::Unsubscribe(p) => Some(p.packet_id),
            Packet::UnsubAck(p) => Some(p.packet_id),
            _ => None,
        }
    }

    /// Decodes a packet body according to the fixed header already read.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed input.
    pub fn decode_from_body<B: Buf>(fixed_header: &FixedHeader, buf: &mut B) -> Result<Self> {
        match fixed_header.packet_type {
            PacketType::Connect => Ok(Packet::Connect(Box::new(
                connect::ConnectPacket::decode_body(buf, fixed_header)?,
            ))),
            PacketType::ConnAck => Ok(Packet::ConnAck(connack::ConnAckPacket::decode_body(
                buf,
                fixed_header,
            )?)),
            PacketType::Publish => Ok(Packet::Publish(publish::PublishPacket::decode_body(
                buf,
                fixed_header,
            )?)),
            PacketType::PubAck => Ok(Packet::PubAck(puback::PubAckPacket::decode_body(
                buf,
                fixed_header,
            )?)),
            PacketType::PubRec => Ok(Packet::PubRec(pubrec::PubRecPacket::decode_body(
                buf,
                fixed_header,
            )?)),
            PacketType::PubRel => Ok(Packet::PubRel(pubrel::PubRelPacket::decode_body(
                buf,
                fixed_header,
            )?)),
            PacketType::PubComp => Ok(Packet::PubComp(pubcomp::PubCompPacket::decode_body(
                buf,
                fixed_header,
            )?)),
            PacketType::Subscribe => Ok(Packet::Subscribe(
                subscribe::SubscribePacket::decode_body(buf, fixed_header)?,
            )),
            PacketType::SubAck => Ok(Packet::SubAck(suback::SubAckPacket::decode_body(
                buf,
                fixed_header,
            )?)),
            PacketType::Unsubscribe => Ok(Packet::Unsubscribe(
                unsubscribe::UnsubscribePacket::decode_body(buf, fixed_header)?,
            )),
            PacketType::UnsubAck => Ok(Packet::UnsubAck(unsuback::UnsubAckPacket::decode_body(
                buf,
                fixed_header,
            )?)),
            PacketType::PingReq => Ok(Packet::PingReq),
            PacketType::PingResp => Ok(Packet::PingResp),
            PacketType::Disconnect => Ok(Packet::Disconnect(
                disconnect::DisconnectPacket::decode_body(buf, fixed_header)?,
            )),
            PacketType::Auth => Ok(Packet::Auth(auth::AuthPacket::decode_body(
                buf,
                fixed_header,
            )?)),
        }
    }

    /// Encodes the complete packet including the fixed header.
    ///
    /// # Errors
    ///
    /// Returns an error when encoding the body fails.
    pub fn encode<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        match self {
            Packet::Connect(p) => p.encode(buf),
            Packet::ConnAck(p) => p.encode(buf),
            Packet::Publish(p) => p.encode(buf),
            Packet::PubAck(p) => p.encode(buf),
            Packet::PubRec(p) => p.encode(buf),
            Packet::PubRel(p) => p.encode(buf),
            Packet::PubComp(p) => p.encode(buf),
            Packet::Subscribe(p) => p.encode(buf),
            Packet::SubAck(p) => p.encode(buf),
            Packet::Unsubscribe(p) => p.encode(buf),
            Packet::UnsubAck(p) => p.encode(buf),
            Packet::PingReq => FixedHeader::new(PacketType::PingReq, 0, 0).encode(buf),
            Packet::PingResp => FixedHeader::new(PacketType::PingResp, 0, 0).encode(buf),
            Packet::Disconnect(p) => p.encode(buf),
            Packet::Auth(p) => p.encode(buf),
        }
    }
}
