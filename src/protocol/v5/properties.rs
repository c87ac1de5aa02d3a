use crate::encoding::{
    decode_binary, decode_string, decode_variable_int, encode_binary, encode_string,
    encode_variable_int,
};
use crate::error::{MqttError, Result};
use bytes::{Buf, BufMut, Bytes};
use std::collections::HashMap;

/// MQTT v5.0 property identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyId {
    PayloadFormatIndicator = 0x01,
    MessageExpiryInterval = 0x02,
    ContentType = 0x03,
    ResponseTopic = 0x08,
    CorrelationData = 0x09,
    SubscriptionIdentifier = 0x0B,
    SessionExpiryInterval = 0x11,
    AssignedClientIdentifier = 0x12,
    ServerKeepAlive = 0x13,
    AuthenticationMethod = 0x15,
    AuthenticationData = 0x16,
    RequestProblemInformation = 0x17,
    WillDelayInterval = 0x18,
    RequestResponseInformation = 0x19,
    ResponseInformation = 0x1A,
    ServerReference = 0x1C,
    ReasonString = 0x1F,
    ReceiveMaximum = 0x21,
    TopicAliasMaximum = 0x22,
    TopicAlias = 0x23,
    MaximumQoS = 0x24,
    RetainAvailable = 0x25,
    UserProperty = 0x26,
    MaximumPacketSize = 0x27,
    WildcardSubscriptionAvailable = 0x28,
    SubscriptionIdentifierAvailable = 0x29,
    SharedSubscriptionAvailable = 0x2A,
}

impl PropertyId {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::PayloadFormatIndicator),
            0x02 => Some(Self::MessageExpiryInterval),
            0x03 => Some(Self::ContentType),
            0x08 => Some(Self::ResponseTopic),
            0x09 => Some(Self::CorrelationData),
            0x0B => Some(Self::SubscriptionIdentifier),
            0x11 => Some(Self::SessionExpiryInterval),
            0x12 => Some(Self::AssignedClientIdentifier),
            0x13 => Some(Self::ServerKeepAlive),
            0x15 => Some(Self::AuthenticationMethod),
            0x16 => Some(Self::AuthenticationData),
            0x17 => Some(Self::RequestProblemInformation),
            0x18 => Some(Self::WillDelayInterval),
            0x19 => Some(Self::RequestResponseInformation),
            0x1A => Some(Self::ResponseInformation),
            0x1C => Some(Self::ServerReference),
            0x1F => Some(Self::ReasonString),
            0x21 => Some(Self::ReceiveMaximum),
            0x22 => Some(Self::TopicAliasMaximum),
            0x23 => Some(Self::TopicAlias),
            0x24 => Some(Self::MaximumQoS),
            0x25 => Some(Self::RetainAvailable),
            0x26 => Some(Self::UserProperty),
            0x27 => Some(Self::MaximumPacketSize),
            0x28 => Some(Self::WildcardSubscriptionAvailable),
            0x29 => Some(Self::SubscriptionIdentifierAvailable),
            0x2A => Some(Self::SharedSubscriptionAvailable),
            _ => None,
        }
    }

    /// UserProperty and SubscriptionIdentifier may appear more than once in
    /// a packet; every other property must be unique.
    #[must_use]
    pub fn allows_multiple(self) -> bool {
        matches!(self, Self::UserProperty | Self::SubscriptionIdentifier)
    }

    #[must_use]
    pub fn value_type(self) -> PropertyValueType {
        match self {
            Self::PayloadFormatIndicator
            | Self::RequestProblemInformation
            | Self::RequestResponseInformation
            | Self::MaximumQoS
            | Self::RetainAvailable
            | Self::WildcardSubscriptionAvailable
            | Self::SubscriptionIdentifierAvailable
            | Self::SharedSubscriptionAvailable => PropertyValueType::Byte,

            Self::ServerKeepAlive
            | Self::ReceiveMaximum
            | Self::TopicAliasMaximum
            | Self::TopicAlias => PropertyValueType::TwoByteInteger,

            Self::MessageExpiryInterval
            | Self::SessionExpiryInterval
            | Self::WillDelayInterval
            | Self::MaximumPacketSize => PropertyValueType::FourByteInteger,

            Self::SubscriptionIdentifier => PropertyValueType::VariableByteInteger,

            Self::ContentType
            | Self::ResponseTopic
            | Self::AssignedClientIdentifier
            | Self::AuthenticationMethod
            | Self::ResponseInformation
            | Self::ServerReference
            | Self::ReasonString => PropertyValueType::Utf8String,

            Self::CorrelationData | Self::AuthenticationData => PropertyValueType::BinaryData,

            Self::UserProperty => PropertyValueType::Utf8StringPair,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyValueType {
    Byte,
    TwoByteInteger,
    FourByteInteger,
    VariableByteInteger,
    BinaryData,
    Utf8String,
    Utf8StringPair,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Byte(u8),
    TwoByteInteger(u16),
    FourByteInteger(u32),
    VariableByteInteger(u32),
    BinaryData(Bytes),
    Utf8String(String),
    Utf8StringPair(String, String),
}

impl PropertyValue {
    #[must_use]
    pub fn value_type(&self) -> PropertyValueType {
        match self {
            Self::Byte(_) => PropertyValueType::Byte,
            Self::TwoByteInteger(_) => PropertyValueType::TwoByteInteger,
            Self::FourByteInteger(_) => PropertyValueType::FourByteInteger,
            Self::VariableByteInteger(_) => PropertyValueType::VariableByteInteger,
            Self::BinaryData(_) => PropertyValueType::BinaryData,
            Self::Utf8String(_) => PropertyValueType::Utf8String,
            Self::Utf8StringPair(_, _) => PropertyValueType::Utf8StringPair,
        }
    }
}

/// Container for the properties section of a control packet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    properties: HashMap<PropertyId, Vec<PropertyValue>>,
}

impl Properties {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a property value, enforcing type and uniqueness rules.
    ///
    /// # Errors
    ///
    /// Returns an error when the value type does not match the identifier,
    /// or when a unique property is added twice.
    pub fn add(&mut self, id: PropertyId, value: PropertyValue) -> Result<()> {
        if value.value_type() != id.value_type() {
            return Err(MqttError::MalformedPacket(format!(
                "property {id:?} expects {:?}, got {:?}",
                id.value_type(),
                value.value_type()
            )));
        }
        if !id.allows_multiple() && self.properties.contains_key(&id) {
            return Err(MqttError::DuplicatePropertyId(id as u8));
        }
        self.properties.entry(id).or_default().push(value);
        Ok(())
    }

    /// Sets a unique property, replacing any existing value. The value type
    /// is guaranteed by the typed setters below.
    fn insert(&mut self, id: PropertyId, value: PropertyValue) {
        debug_assert_eq!(value.value_type(), id.value_type());
        self.properties.insert(id, vec![value]);
    }

    #[must_use]
    pub fn get(&self, id: PropertyId) -> Option<&PropertyValue> {
        self.properties.get(&id).and_then(|v| v.first())
    }

    #[must_use]
    pub fn get_all(&self, id: PropertyId) -> Option<&[PropertyValue]> {
        self.properties.get(&id).map(Vec::as_slice)
    }

    #[must_use]
    pub fn contains(&self, id: PropertyId) -> bool {
        self.properties.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PropertyId, &PropertyValue)> + '_ {
        self.properties
            .iter()
            .flat_map(|(id, values)| values.iter().map(move |value| (*id, value)))
    }

    /// Encodes the full properties section: a variable byte integer length
    /// followed by the property list.
    ///
    /// # Errors
    ///
    /// Returns an error if a contained string or binary field is oversized.
    pub fn encode<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        let mut body = Vec::new();
        self.encode_values(&mut body)?;
        encode_variable_int(buf, body.len() as u32)?;
        buf.put_slice(&body);
        Ok(())
    }

    fn encode_values<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        // Sorted by identifier so encoding is deterministic.
        let mut sorted: Vec<_> = self.properties.iter().collect();
        sorted.sort_by_key(|(id, _)| **id as u8);

        for (id, values) in sorted {
            for value in values {
                encode_variable_int(buf, u32::from(*id as u8))?;
                match value {
                    PropertyValue::Byte(v) => buf.put_u8(*v),
                    PropertyValue::TwoByteInteger(v) => buf.put_u16(*v),
                    PropertyValue::FourByteInteger(v) => buf.put_u32(*v),
                    PropertyValue::VariableByteInteger(v) => encode_variable_int(buf, *v)?,
                    PropertyValue::BinaryData(v) => encode_binary(buf, v)?,
                    PropertyValue::Utf8String(v) => encode_string(buf, v)?,
                    PropertyValue::Utf8StringPair(k, v) => {
                        encode_string(buf, k)?;
                        encode_string(buf, v)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Decodes a properties section.
    ///
    /// # Errors
    ///
    /// Returns an error on unknown identifiers, truncated values, or
    /// duplicated unique properties.
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        let len = decode_variable_int(buf)? as usize;
        if buf.remaining() < len {
            return Err(MqttError::MalformedPacket(format!(
                "properties claim {len} bytes, {} available",
                buf.remaining()
            )));
        }
        let mut section = buf.copy_to_bytes(len);

        let mut props = Self::new();
        while section.has_remaining() {
            let raw = decode_variable_int(&mut section)?;
            let raw = u8::try_from(raw).map_err(|_| MqttError::InvalidPropertyId(0xFF))?;
            let id = PropertyId::from_u8(raw).ok_or(MqttError::InvalidPropertyId(raw))?;

            let value = match id.value_type() {
                PropertyValueType::Byte => {
                    if !section.has_remaining() {
                        return Err(MqttError::MalformedPacket("truncated property".into()));
                    }
                    PropertyValue::Byte(section.get_u8())
                }
                PropertyValueType::TwoByteInteger => {
                    if section.remaining() < 2 {
                        return Err(MqttError::MalformedPacket("truncated property".into()));
                    }
                    PropertyValue::TwoByteInteger(section.get_u16())
                }
                PropertyValueType::FourByteInteger => {
                    if section.remaining() < 4 {
                        return Err(MqttError::MalformedPacket("truncated property".into()));
                    }
                    PropertyValue::FourByteInteger(section.get_u32())
                }
                PropertyValueType::VariableByteInteger => {
                    PropertyValue::VariableByteInteger(decode_variable_int(&mut section)?)
                }
                PropertyValueType::BinaryData => {
                    PropertyValue::BinaryData(decode_binary(&mut section)?)
                }
                PropertyValueType::Utf8String => {
                    PropertyValue::Utf8String(decode_string(&mut section)?)
                }
                PropertyValueType::Utf8StringPair => {
                    let key = decode_string(&mut section)?;
                    let val = decode_string(&mut section)?;
                    PropertyValue::Utf8StringPair(key, val)
                }
            };

            props.add(id, value)?;
        }

        Ok(props)
    }
}

// Typed accessors for the properties the session negotiates on.
impl Properties {
    fn byte(&self, id: PropertyId) -> Option<u8> {
        match self.get(id)? {
            PropertyValue::Byte(v) => Some(*v),
            _ => None,
        }
    }

    fn u16_value(&self, id: PropertyId) -> Option<u16> {
        match self.get(id)? {
            PropertyValue::TwoByteInteger(v) => Some(*v),
            _ => None,
        }
    }

    fn u32_value(&self, id: PropertyId) -> Option<u32> {
        match self.get(id)? {
            PropertyValue::FourByteInteger(v) => Some(*v),
            _ => None,
        }
    }

    fn string(&self, id: PropertyId) -> Option<&str> {
        match self.get(id)? {
            PropertyValue::Utf8String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn receive_maximum(&self) -> Option<u16> {
        self.u16_value(PropertyId::ReceiveMaximum)
    }

    #[must_use]
    pub fn maximum_qos(&self) -> Option<u8> {
        self.byte(PropertyId::MaximumQoS)
    }

    #[must_use]
    pub fn maximum_packet_size(&self) -> Option<u32> {
        self.u32_value(PropertyId::MaximumPacketSize)
    }

    #[must_use]
    pub fn topic_alias_maximum(&self) -> Option<u16> {
        self.u16_value(PropertyId::TopicAliasMaximum)
    }

    #[must_use]
    pub fn topic_alias(&self) -> Option<u16> {
        self.u16_value(PropertyId::TopicAlias)
    }

    #[must_use]
    pub fn retain_available(&self) -> Option<bool> {
        self.byte(PropertyId::RetainAvailable).map(|v| v != 0)
    }

    #[must_use]
    pub fn wildcard_subscription_available(&self) -> Option<bool> {
        self.byte(PropertyId::WildcardSubscriptionAvailable)
            .map(|v| v != 0)
    }

    #[must_use]
    pub fn subscription_identifier_available(&self) -> Option<bool> {
        self.byte(PropertyId::SubscriptionIdentifierAvailable)
            .map(|v| v != 0)
    }

    #[must_use]
    pub fn shared_subscription_available(&self) -> Option<bool> {
        self.byte(PropertyId::SharedSubscriptionAvailable)
            .map(|v| v != 0)
    }

    #[must_use]
    pub fn assigned_client_identifier(&self) -> Option<&str> {
        self.string(PropertyId::AssignedClientIdentifier)
    }

    #[must_use]
    pub fn server_keep_alive(&self) -> Option<u16> {
        self.u16_value(PropertyId::ServerKeepAlive)
    }

    #[must_use]
    pub fn reason_string(&self) -> Option<&str> {
        self.string(PropertyId::ReasonString)
    }

    #[must_use]
    pub fn response_topic(&self) -> Option<&str> {
        self.string(PropertyId::ResponseTopic)
    }

    #[must_use]
    pub fn correlation_data(&self) -> Option<&Bytes> {
        match self.get(PropertyId::CorrelationData)? {
            PropertyValue::BinaryData(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn authentication_method(&self) -> Option<&str> {
        self.string(PropertyId::AuthenticationMethod)
    }

    #[must_use]
    pub fn authentication_data(&self) -> Option<&Bytes> {
        match self.get(PropertyId::AuthenticationData)? {
            PropertyValue::BinaryData(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn subscription_identifier(&self) -> Option<u32> {
        match self.get(PropertyId::SubscriptionIdentifier)? {
            PropertyValue::VariableByteInteger(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn user_properties(&self) -> Vec<(&str, &str)> {
        self.get_all(PropertyId::UserProperty)
            .into_iter()
            .flatten()
            .filter_map(|v| match v {
                PropertyValue::Utf8StringPair(k, val) => Some((k.as_str(), val.as_str())),
                _ => None,
            })
            .collect()
    }
}

// Typed setters used when building packets.
impl Properties {
    pub fn set_payload_format_indicator(&mut self, is_utf8: bool) {
        self.insert(
            PropertyId::PayloadFormatIndicator,
            PropertyValue::Byte(u8::from(is_utf8)),
        );
    }

    pub fn set_message_expiry_interval(&mut self, seconds: u32) {
        self.insert(
            PropertyId::MessageExpiryInterval,
            PropertyValue::FourByteInteger(seconds),
        );
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.insert(
            PropertyId::ContentType,
            PropertyValue::Utf8String(content_type.into()),
        );
    }

    pub fn set_response_topic(&mut self, topic: impl Into<String>) {
        self.insert(
            PropertyId::ResponseTopic,
            PropertyValue::Utf8String(topic.into()),
        );
    }

    pub fn set_correlation_data(&mut self, data: impl Into<Bytes>) {
        self.insert(
            PropertyId::CorrelationData,
            PropertyValue::BinaryData(data.into()),
        );
    }

    pub fn add_subscription_identifier(&mut self, id: u32) {
        let _ = self.add(
            PropertyId::SubscriptionIdentifier,
            PropertyValue::VariableByteInteger(id),
        );
    }

    pub fn set_session_expiry_interval(&mut self, seconds: u32) {
        self.insert(
            PropertyId::SessionExpiryInterval,
            PropertyValue::FourByteInteger(seconds),
        );
    }

    pub fn set_assigned_client_identifier(&mut self, id: impl Into<String>) {
        self.insert(
            PropertyId::AssignedClientIdentifier,
            PropertyValue::Utf8String(id.into()),
        );
    }

    pub fn set_server_keep_alive(&mut self, seconds: u16) {
        self.insert(
            PropertyId::ServerKeepAlive,
            PropertyValue::TwoByteInteger(seconds),
        );
    }

    pub fn set_authentication_method(&mut self, method: impl Into<String>) {
        self.insert(
            PropertyId::AuthenticationMethod,
            PropertyValue::Utf8String(method.into()),
        );
    }

    pub fn set_authentication_data(&mut self, data: impl Into<Bytes>) {
        self.insert(
            PropertyId::AuthenticationData,
            PropertyValue::BinaryData(data.into()),
        );
    }

    pub fn set_will_delay_interval(&mut self, seconds: u32) {
        self.insert(
            PropertyId::WillDelayInterval,
            PropertyValue::FourByteInteger(seconds),
        );
    }

    pub fn set_reason_string(&mut self, reason: impl Into<String>) {
        self.insert(
            PropertyId::ReasonString,
            PropertyValue::Utf8String(reason.into()),
        );
    }

    pub fn set_receive_maximum(&mut self, max: u16) {
        self.insert(PropertyId::ReceiveMaximum, PropertyValue::TwoByteInteger(max));
    }

    pub fn set_maximum_qos(&mut self, qos: u8) {
        self.insert(PropertyId::MaximumQoS, PropertyValue::Byte(qos));
    }

    pub fn set_maximum_packet_size(&mut self, size: u32) {
        self.insert(
            PropertyId::MaximumPacketSize,
            PropertyValue::FourByteInteger(size),
        );
    }

    pub fn set_topic_alias_maximum(&mut self, max: u16) {
        self.insert(
            PropertyId::TopicAliasMaximum,
            PropertyValue::TwoByteInteger(max),
        );
    }

    pub fn set_topic_alias(&mut self, alias: u16) {
        self.insert(PropertyId::TopicAlias, PropertyValue::TwoByteInteger(alias));
    }

    pub fn set_retain_available(&mut self, available: bool) {
        self.insert(
            PropertyId::RetainAvailable,
            PropertyValue::Byte(u8::from(available)),
        );
    }

    pub fn set_wildcard_subscription_available(&mut self, available: bool) {
        self.insert(
            PropertyId::WildcardSubscriptionAvailable,
            PropertyValue::Byte(u8::from(available)),
        );
    }

    pub fn set_subscription_identifier_available(&mut self, available: bool) {
        self.insert(
            PropertyId::SubscriptionIdentifierAvailable,
            PropertyValue::Byte(u8::from(available)),
        );
    }

    pub fn set_shared_subscription_available(&mut self, available: bool) {
        self.insert(
            PropertyId::SharedSubscriptionAvailable,
            PropertyValue::Byte(u8::from(available)),
        );
    }

    pub fn add_user_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let _ = self.add(
            PropertyId::UserProperty,
            PropertyValue::Utf8StringPair(key.into(), value.into()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn empty_section_encodes_single_zero() {
        let props = Properties::new();
        let mut buf = BytesMut::new();
        props.encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0x00]);
        assert!(Properties::decode(&mut buf).unwrap().is_empty());
    }

    #[test]
    fn typed_round_trip() {
        let mut props = Properties::new();
        props.set_receive_maximum(10);
        props.set_assigned_client_identifier("c17");
        props.set_retain_available(false);
        props.add_user_property("origin", "test");
        props.add_user_property("origin", "again");

        let mut buf = BytesMut::new();
        props.encode(&mut buf).unwrap();
        let decoded = Properties::decode(&mut buf).unwrap();

        assert_eq!(decoded.receive_maximum(), Some(10));
        assert_eq!(decoded.assigned_client_identifier(), Some("c17"));
        assert_eq!(decoded.retain_available(), Some(false));
        assert_eq!(decoded.user_properties().len(), 2);
        assert_eq!(decoded.maximum_qos(), None);
    }

    #[test]
    fn rejects_duplicate_unique_property() {
        let mut props = Properties::new();
        props
            .add(PropertyId::TopicAlias, PropertyValue::TwoByteInteger(1))
            .unwrap();
        let err = props
            .add(PropertyId::TopicAlias, PropertyValue::TwoByteInteger(2))
            .unwrap_err();
        assert!(matches!(err, MqttError::DuplicatePropertyId(0x23)));
    }

    #[test]
    fn rejects_type_mismatch() {
        let mut props = Properties::new();
        assert!(props
            .add(PropertyId::ReceiveMaximum, PropertyValue::Byte(1))
            .is_err());
    }

    #[test]
    fn rejects_unknown_identifier() {
        // length 2, id 0x7F (unassigned), byte value
        let mut buf = BytesMut::from(&[0x02, 0x7F, 0x00][..]);
        assert!(matches!(
            Properties::decode(&mut buf),
            Err(MqttError::InvalidPropertyId(0x7F))
        ));
    }

    #[test]
    fn setters_replace_existing_values() {
        let mut props = Properties::new();
        props.set_topic_alias(3);
        props.set_topic_alias(7);
        assert_eq!(props.topic_alias(), Some(7));
    }
}
